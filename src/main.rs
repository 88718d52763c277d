//! TSP Solver - Command Line Interface
//!
//! Solves Euclidean TSP instances with the nearest-neighbour, 2-opt, MST and
//! branch-and-bound algorithms, and runs statistical experiments over them.

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use tsp_solver::benchmark::{
    compare_lengths, export_scalability_csv, gaps_to_exact, run_experiment, run_scalability_study, run_single_experiment,
    Algorithm, ExperimentConfig,
};
use tsp_solver::error::{Result, TspError};
use tsp_solver::exact::{BranchAndBoundConfig, BranchAndBoundSolver, LowerBound};
use tsp_solver::graph::{Graph, GraphBuilder};
use tsp_solver::solution::{format_tour, Solution};
use tsp_solver::visualization::{export_plot_files, Visualizer};

use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "tsp-solver")]
#[command(author = "Etudiant L3 INFO-SD")]
#[command(version = "1.0")]
#[command(about = "Heuristic and exact solvers for the Euclidean TSP")]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance with every algorithm
    #[command(group(ArgGroup::new("source").required(true).args(["n", "file"])))]
    Solve {
        /// Number of random points in the unit square
        #[arg(short, long, allow_negative_numbers = true)]
        n: Option<i64>,

        /// Point file, one `(x, y)` or `x y` per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Start vertex of the constructions and of the exact search
        #[arg(long, default_value = "0")]
        start: usize,

        /// Run the exact solver
        #[arg(long)]
        exact: bool,

        /// Largest instance the exact solver is run on
        #[arg(long, default_value = "12")]
        exact_max_n: usize,

        /// Lower bound used by the exact solver
        #[arg(long, value_enum, default_value = "half-sum")]
        bound: BoundArg,

        /// Node budget of the exact solver
        #[arg(long, default_value = "100000")]
        max_nodes: usize,

        /// Time limit of the exact solver in seconds
        #[arg(long)]
        time_limit: Option<f64>,

        /// Random seed for generated points
        #[arg(short, long)]
        seed: Option<u64>,

        /// Save the points to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Write all solutions as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a side-by-side drawing of the tours (.svg or .png)
        #[arg(long)]
        visualize: Option<PathBuf>,

        /// Directory for per-algorithm plot data and a comparison table
        #[arg(long)]
        plot_data: Option<PathBuf>,
    },

    /// Multi-trial statistical study on random instances
    Experiment {
        /// Number of points per instance
        #[arg(short, long, default_value = "15")]
        n: usize,

        #[arg(short, long, default_value = "100")]
        trials: usize,

        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Do not run the exact solver
        #[arg(long)]
        no_exact: bool,

        /// Run trials one after another
        #[arg(long)]
        sequential: bool,

        /// Output directory for CSV files and the report
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Mean running time and length of the heuristics over several sizes
    Scalability {
        #[arg(long, value_delimiter = ',', default_value = "5,10,15,20,25")]
        sizes: Vec<usize>,

        #[arg(short, long, default_value = "20")]
        trials: usize,

        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output CSV file
        #[arg(short, long, default_value = "results/scalability.csv")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum BoundArg {
    /// Half-sum of the two cheapest edges per unvisited vertex
    HalfSum,
    /// Cheapest exit plus cheapest inner edge per remaining step
    Simple,
}

impl From<BoundArg> for LowerBound {
    fn from(arg: BoundArg) -> Self {
        match arg {
            BoundArg::HalfSum => LowerBound::HalfSum,
            BoundArg::Simple => LowerBound::Simple,
        }
    }
}

/// Options of the `solve` command
struct SolveOptions {
    start: usize,
    exact: bool,
    exact_max_n: usize,
    bound: LowerBound,
    max_nodes: usize,
    time_limit: Option<f64>,
    save: Option<PathBuf>,
    output: Option<PathBuf>,
    visualize: Option<PathBuf>,
    plot_data: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let outcome = match cli.command {
        Commands::Solve {
            n,
            file,
            start,
            exact,
            exact_max_n,
            bound,
            max_nodes,
            time_limit,
            seed,
            save,
            output,
            visualize,
            plot_data,
        } => load_graph(n, file.as_deref(), seed).and_then(|graph| {
            let options = SolveOptions {
                start,
                exact,
                exact_max_n,
                bound: bound.into(),
                max_nodes,
                time_limit,
                save,
                output,
                visualize,
                plot_data,
            };
            solve_instance(&graph, &options)
        }),

        Commands::Experiment {
            n,
            trials,
            seed,
            no_exact,
            sequential,
            output,
        } => {
            let config = ExperimentConfig {
                n,
                num_trials: trials,
                run_exact: !no_exact,
                seed,
                parallel: !sequential,
                ..Default::default()
            };
            run_statistics(&config, &output)
        }

        Commands::Scalability {
            sizes,
            trials,
            seed,
            output,
        } => run_scalability(&sizes, trials, seed, &output),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_graph(n: Option<i64>, file: Option<&Path>, seed: Option<u64>) -> Result<Graph> {
    if let Some(path) = file {
        println!("Loading points from {:?}...", path);
        return Graph::load_from_file(path);
    }

    let mut builder = GraphBuilder::new();
    if let Some(n) = n {
        builder = builder.count(n);
    }
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    builder.build()
}

fn solve_instance(graph: &Graph, options: &SolveOptions) -> Result<()> {
    println!("{}", graph.statistics());

    if let Some(path) = &options.save {
        graph.save_to_file(path)?;
        println!("Points saved to {:?}", path);
    }

    let config = ExperimentConfig {
        n: graph.n(),
        num_trials: 1,
        start: options.start,
        // the exact solver is run separately below, with the chosen bound
        run_exact: false,
        ..Default::default()
    };
    let mut solutions: Vec<(Algorithm, Solution)> = run_single_experiment(graph, &config)?
        .into_iter()
        .map(|record| (record.algorithm, record.solution))
        .collect();

    if options.exact {
        if graph.n() > options.exact_max_n {
            log::warn!(
                "exact solver skipped: n = {} exceeds --exact-max-n {}",
                graph.n(),
                options.exact_max_n
            );
        } else {
            let time_limit = options
                .time_limit
                .map(|secs| {
                    Duration::try_from_secs_f64(secs)
                        .map_err(|_| TspError::invalid_input(format!("invalid time limit {}", secs)))
                })
                .transpose()?;
            let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
                lower_bound: options.bound,
                max_nodes: Some(options.max_nodes),
                time_limit,
                start: options.start,
            });
            let result = solver.solve(graph)?;

            println!("Branch and bound ({} bound):", options.bound);
            println!("  Status: {}", result.status);
            println!("  Root bound: {:.6}", result.root_bound);
            println!("  Nodes explored: {}", result.nodes_explored);
            println!("  Nodes pruned: {} ({:.1}%)", result.nodes_pruned, result.pruning_efficiency());
            println!("  Root gap: {:.2}%", 100.0 * result.root_gap());
            solutions.push((Algorithm::BranchAndBound, result.solution));
        }
    }

    println!("\n========== Results ==========");
    println!("{:<18} {:>12} {:>12}  Tour", "Algorithm", "Length", "Time");
    println!("{}", "-".repeat(70));
    for (algorithm, solution) in &solutions {
        println!(
            "{:<18} {:>12.6} {:>11.6}s  {}",
            algorithm,
            solution.length,
            solution.computation_time,
            format_tour(&solution.tour, 10)
        );
    }

    let length_of = |algorithm: Algorithm| {
        solutions
            .iter()
            .find(|(a, _)| *a == algorithm)
            .map(|(_, solution)| solution.length)
    };

    let improvements = compare_lengths(length_of);
    if !improvements.is_empty() {
        println!("\nImprovements:");
        for imp in &improvements {
            println!("  {} vs {}: {:+.2}%", imp.better, imp.baseline, imp.percent);
        }
    }

    let gaps = gaps_to_exact(length_of);
    if !gaps.is_empty() {
        println!("\nGap to optimum:");
        for (algorithm, gap) in &gaps {
            println!("  {:<18} {:+.2}%", algorithm, gap);
        }
    }

    let only_solutions: Vec<Solution> = solutions.into_iter().map(|(_, solution)| solution).collect();

    if let Some(out_path) = &options.output {
        let json = serde_json::to_string_pretty(&only_solutions).map_err(std::io::Error::from)?;
        std::fs::write(out_path, json)?;
        println!("\nSolutions saved to {:?}", out_path);
    }

    if let Some(path) = &options.visualize {
        let viz = Visualizer::new();
        let svg = viz.generate_comparison_svg(graph, &only_solutions);
        let wants_png = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png"));

        if wants_png {
            match viz.save_png(&svg, path) {
                Ok(()) => println!("Visualization saved to {:?}", path),
                Err(e) => {
                    let svg_path = path.with_extension("svg");
                    viz.save_svg(&svg, &svg_path)?;
                    println!("PNG conversion failed ({}). Saved SVG to {:?}", e, svg_path);
                }
            }
        } else {
            viz.save_svg(&svg, path)?;
            println!("Visualization saved to {:?}", path);
        }
    }

    if let Some(dir) = &options.plot_data {
        let written = export_plot_files(&Visualizer::new(), graph, &only_solutions, dir)?;
        println!("Plot data ({} files) saved to {:?}", written.len(), dir);
    }

    Ok(())
}

fn run_statistics(config: &ExperimentConfig, output: &Path) -> Result<()> {
    if config.num_trials == 0 {
        return Err(TspError::invalid_input("number of trials must be positive"));
    }
    std::fs::create_dir_all(output)?;

    let results = run_experiment(config)?;

    let results_path = output.join("results.csv");
    results.export_to_csv(&results_path)?;
    println!("Results exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    results.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = results.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn run_scalability(sizes: &[usize], trials: usize, seed: u64, output: &Path) -> Result<()> {
    if trials == 0 {
        return Err(TspError::invalid_input("number of trials must be positive"));
    }

    let points = run_scalability_study(sizes, trials, seed, true)?;

    println!("{:<6} {:<18} {:>12} {:>12}", "n", "Algorithm", "Mean Time", "Mean Length");
    println!("{}", "-".repeat(52));
    for point in &points {
        println!(
            "{:<6} {:<18} {:>11.6}s {:>12.6}",
            point.n, point.algorithm, point.mean_time, point.mean_length
        );
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    export_scalability_csv(&points, output)?;
    println!("\nScalability results exported to {:?}", output);

    Ok(())
}
