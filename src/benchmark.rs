//! Benchmarking and experimentation module.
//!
//! Runs the four algorithms on random instances, collects per-trial results and
//! summarises them: mean, spread and 95% confidence interval of the tour length,
//! relative improvements between heuristics and gaps to the exact optimum.

use crate::error::{Result, TspError};
use crate::exact::{BranchAndBoundConfig, BranchAndBoundSolver, LowerBound};
use crate::graph::Graph;
use crate::heuristics::{ConstructionHeuristic, MstApproxHeuristic, NearestNeighborHeuristic, TwoOptSearch};
use crate::solution::Solution;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;
use std::fs::File;
use std::path::Path;

/// The algorithms compared by the harness, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Algorithm {
    NearestNeighbor,
    TwoOpt,
    MstApprox,
    BranchAndBound,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::NearestNeighbor,
        Algorithm::TwoOpt,
        Algorithm::MstApprox,
        Algorithm::BranchAndBound,
    ];

    pub fn is_exact(self) -> bool {
        self == Algorithm::BranchAndBound
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Algorithm::NearestNeighbor => "NearestNeighbor",
            Algorithm::TwoOpt => "NN+2-Opt",
            Algorithm::MstApprox => "MstApprox",
            Algorithm::BranchAndBound => "BranchAndBound",
        };
        f.pad(name)
    }
}

/// Benchmark configuration
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentConfig {
    /// Number of points per random instance
    pub n: usize,
    pub num_trials: usize,
    /// Start vertex of every construction
    pub start: usize,
    /// Run the exact solver when `n <= exact_max_n`
    pub run_exact: bool,
    pub exact_max_n: usize,
    /// Node budget for the exact solver
    pub exact_max_nodes: usize,
    /// Trial `t` uses instance seed `seed + t`
    pub seed: u64,
    /// Run trials on the rayon pool
    pub parallel: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            n: 15,
            num_trials: 100,
            start: 0,
            run_exact: true,
            exact_max_n: 12,
            exact_max_nodes: 50_000,
            seed: 42,
            parallel: true,
        }
    }
}

impl ExperimentConfig {
    pub fn exact_enabled(&self) -> bool {
        self.run_exact && self.n <= self.exact_max_n
    }
}

/// One algorithm's output on one instance
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub algorithm: Algorithm,
    pub solution: Solution,
    /// Whether the exact solver proved optimality; `None` for heuristics
    pub optimal: Option<bool>,
}

/// Result of running a single algorithm on an instance, one CSV row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    pub trial: usize,
    pub algorithm: Algorithm,
    pub n: usize,
    pub length: f64,
    /// Computation time in seconds
    pub time: f64,
    pub iterations: Option<usize>,
    pub optimal: Option<bool>,
}

/// Aggregated statistics for an algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: Algorithm,
    pub count: usize,
    pub mean_length: f64,
    /// Population standard deviation
    pub std_length: f64,
    pub min_length: f64,
    pub max_length: f64,
    /// Half-width of the 95% Student-t confidence interval of the mean length
    pub ci95_half_width: f64,
    pub mean_time: f64,
    pub std_time: f64,
}

impl AlgorithmStatistics {
    /// `None` when `lengths` is empty.
    pub fn from_samples(algorithm: Algorithm, lengths: &[f64], times: &[f64]) -> Option<Self> {
        if lengths.is_empty() {
            return None;
        }

        let (mean_time, std_time) = if times.is_empty() {
            (0.0, 0.0)
        } else {
            (Statistics::mean(times), Statistics::population_std_dev(times))
        };

        Some(AlgorithmStatistics {
            algorithm,
            count: lengths.len(),
            mean_length: Statistics::mean(lengths),
            std_length: Statistics::population_std_dev(lengths),
            min_length: Statistics::min(lengths),
            max_length: Statistics::max(lengths),
            ci95_half_width: confidence_half_width(lengths, 0.95),
            mean_time,
            std_time,
        })
    }
}

/// Half-width of the two-sided Student-t interval for the mean; 0 below two samples.
pub fn confidence_half_width(samples: &[f64], level: f64) -> f64 {
    let count = samples.len();
    if count < 2 {
        return 0.0;
    }

    let dof = (count - 1) as f64;
    let quantile = match StudentsT::new(0.0, 1.0, dof) {
        Ok(dist) => dist.inverse_cdf(0.5 + level / 2.0),
        Err(_) => return f64::NAN,
    };
    quantile * Statistics::std_dev(samples) / (count as f64).sqrt()
}

/// Relative improvement of `better` over `baseline` mean lengths
#[derive(Debug, Clone, Serialize)]
pub struct Improvement {
    pub baseline: Algorithm,
    pub better: Algorithm,
    /// `(baseline - better) / baseline`, in percent
    pub percent: f64,
}

/// 2-opt over nearest neighbour, MST over 2-opt, MST over nearest neighbour.
///
/// `length` gives the length to compare for an algorithm (a mean over trials, or
/// the single length of one instance); pairs with a missing side are skipped.
pub fn compare_lengths<F>(length: F) -> Vec<Improvement>
where
    F: Fn(Algorithm) -> Option<f64>,
{
    let pairs = [
        (Algorithm::NearestNeighbor, Algorithm::TwoOpt),
        (Algorithm::TwoOpt, Algorithm::MstApprox),
        (Algorithm::NearestNeighbor, Algorithm::MstApprox),
    ];

    pairs
        .iter()
        .filter_map(|&(baseline, better)| {
            let base = length(baseline)?;
            let other = length(better)?;
            (base > 0.0).then(|| Improvement {
                baseline,
                better,
                percent: (base - other) / base * 100.0,
            })
        })
        .collect()
}

/// Percent gap of each heuristic to the exact length; empty without an exact length.
pub fn gaps_to_exact<F>(length: F) -> Vec<(Algorithm, f64)>
where
    F: Fn(Algorithm) -> Option<f64>,
{
    let Some(optimum) = length(Algorithm::BranchAndBound).filter(|&opt| opt > 0.0) else {
        return Vec::new();
    };

    Algorithm::ALL
        .iter()
        .filter(|a| !a.is_exact())
        .filter_map(|&a| length(a).map(|value| (a, (value - optimum) / optimum * 100.0)))
        .collect()
}

/// Mean timing and length of one algorithm at one instance size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalabilityPoint {
    pub n: usize,
    pub algorithm: Algorithm,
    pub mean_time: f64,
    pub mean_length: f64,
}

/// Run every algorithm once on `graph`.
///
/// The 2-opt pass starts from the nearest-neighbour tour and its time covers only
/// the improvement. The exact solver runs only when enabled for this size; if its
/// budget ends without a tour the run is logged and left out.
pub fn run_single_experiment(graph: &Graph, config: &ExperimentConfig) -> Result<Vec<RunRecord>> {
    let mut records = Vec::with_capacity(4);

    let nn = NearestNeighborHeuristic::new(config.start).construct(graph)?;
    let two_opt = TwoOptSearch::new().optimize(graph, &nn.tour)?;
    let mst = MstApproxHeuristic::new(config.start).construct(graph)?;

    records.push(RunRecord {
        algorithm: Algorithm::NearestNeighbor,
        solution: nn,
        optimal: None,
    });
    records.push(RunRecord {
        algorithm: Algorithm::TwoOpt,
        solution: two_opt,
        optimal: None,
    });
    records.push(RunRecord {
        algorithm: Algorithm::MstApprox,
        solution: mst,
        optimal: None,
    });

    if config.run_exact && graph.n() <= config.exact_max_n {
        let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
            lower_bound: LowerBound::HalfSum,
            max_nodes: Some(config.exact_max_nodes),
            time_limit: None,
            start: config.start,
        });
        match solver.solve(graph) {
            Ok(result) => {
                let optimal = result.is_optimal();
                records.push(RunRecord {
                    algorithm: Algorithm::BranchAndBound,
                    solution: result.solution,
                    optimal: Some(optimal),
                });
            }
            Err(TspError::NoSolution(reason)) => {
                log::warn!("{}: exact solver gave up: {}", graph.name(), reason);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(records)
}

fn run_trial(config: &ExperimentConfig, trial: usize) -> Result<Vec<AlgorithmResult>> {
    let graph = Graph::with_seed(config.n, config.seed.wrapping_add(trial as u64));
    let records = run_single_experiment(&graph, config)?;

    Ok(records
        .into_iter()
        .map(|record| AlgorithmResult {
            trial,
            algorithm: record.algorithm,
            n: graph.n(),
            length: record.solution.length,
            time: record.solution.computation_time,
            iterations: record.solution.iterations,
            optimal: record.optimal,
        })
        .collect())
}

fn progress_bar(len: usize, message: String) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({elapsed})") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message);
    pb
}

/// Run `config.num_trials` independent trials on fresh random instances.
///
/// Each trial seeds its own generator, so parallel and sequential runs see the
/// same instances and produce the same lengths.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentResults> {
    log::info!(
        "running {} trials with n = {} ({})",
        config.num_trials,
        config.n,
        if config.parallel { "parallel" } else { "sequential" }
    );
    if config.run_exact && !config.exact_enabled() {
        log::warn!(
            "exact solver skipped: n = {} exceeds the limit of {}",
            config.n,
            config.exact_max_n
        );
    }

    let pb = progress_bar(config.num_trials, format!("n={}", config.n));
    let per_trial: Vec<Vec<AlgorithmResult>> = if config.parallel {
        (0..config.num_trials)
            .into_par_iter()
            .map(|trial| {
                let result = run_trial(config, trial);
                pb.inc(1);
                result
            })
            .collect::<Result<_>>()?
    } else {
        (0..config.num_trials)
            .map(|trial| {
                let result = run_trial(config, trial);
                pb.inc(1);
                result
            })
            .collect::<Result<_>>()?
    };
    pb.finish_and_clear();

    let results = ExperimentResults {
        config: config.clone(),
        results: per_trial.into_iter().flatten().collect(),
    };

    for stat in results.statistics() {
        log::info!(
            "{}: mean {:.6} +/- {:.6}, time {:.6}s",
            stat.algorithm,
            stat.mean_length,
            stat.std_length,
            stat.mean_time
        );
    }

    Ok(results)
}

/// Mean time and length of the heuristics over a range of instance sizes.
/// The exact solver is not part of this study.
pub fn run_scalability_study(
    sizes: &[usize],
    num_trials: usize,
    seed: u64,
    parallel: bool,
) -> Result<Vec<ScalabilityPoint>> {
    let mut points = Vec::new();

    for &n in sizes {
        let config = ExperimentConfig {
            n,
            num_trials,
            run_exact: false,
            seed,
            parallel,
            ..Default::default()
        };
        let results = run_experiment(&config)?;

        for stat in results.statistics() {
            points.push(ScalabilityPoint {
                n,
                algorithm: stat.algorithm,
                mean_time: stat.mean_time,
                mean_length: stat.mean_length,
            });
        }
    }

    Ok(points)
}

/// Export scalability points to CSV
pub fn export_scalability_csv<P: AsRef<Path>>(points: &[ScalabilityPoint], path: P) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);

    for point in points {
        writer.serialize(point)?;
    }

    writer.flush()?;
    Ok(())
}

/// Per-trial results of one experiment
#[derive(Debug, Clone)]
pub struct ExperimentResults {
    pub config: ExperimentConfig,
    pub results: Vec<AlgorithmResult>,
}

impl ExperimentResults {
    /// Lengths recorded for `algorithm`, in trial order
    pub fn lengths(&self, algorithm: Algorithm) -> Vec<f64> {
        self.results
            .iter()
            .filter(|r| r.algorithm == algorithm)
            .map(|r| r.length)
            .collect()
    }

    fn times(&self, algorithm: Algorithm) -> Vec<f64> {
        self.results
            .iter()
            .filter(|r| r.algorithm == algorithm)
            .map(|r| r.time)
            .collect()
    }

    /// Compute statistics for each algorithm that produced at least one result
    pub fn statistics(&self) -> Vec<AlgorithmStatistics> {
        Algorithm::ALL
            .iter()
            .filter_map(|&algorithm| {
                AlgorithmStatistics::from_samples(algorithm, &self.lengths(algorithm), &self.times(algorithm))
            })
            .collect()
    }

    fn mean_length(&self, algorithm: Algorithm) -> Option<f64> {
        let lengths = self.lengths(algorithm);
        if lengths.is_empty() {
            None
        } else {
            Some(Statistics::mean(&lengths))
        }
    }

    /// Improvements between mean lengths, see [`compare_lengths`]
    pub fn improvements(&self) -> Vec<Improvement> {
        compare_lengths(|a| self.mean_length(a))
    }

    /// Gap of each heuristic's mean length to the exact mean, in percent.
    /// Empty when the exact solver did not run.
    pub fn gaps_to_optimum(&self) -> Vec<(Algorithm, f64)> {
        gaps_to_exact(|a| self.mean_length(a))
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       TSP Experiment Report\n");
        report.push_str("========================================\n\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        report.push_str(&format!(
            "Instances: {} trials, n = {}, seed {}\n\n",
            self.config.num_trials, self.config.n, self.config.seed
        ));

        report.push_str("Algorithm Performance Summary:\n");
        report.push_str("-".repeat(92).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<18} {:>6} {:>12} {:>12} {:>12} {:>12} {:>12}\n",
            "Algorithm", "Runs", "Mean", "Std", "Min", "Max", "Avg Time"
        ));
        report.push_str("-".repeat(92).as_str());
        report.push('\n');

        for stat in self.statistics() {
            report.push_str(&format!(
                "{:<18} {:>6} {:>12.6} {:>12.6} {:>12.6} {:>12.6} {:>11.6}s\n",
                stat.algorithm,
                stat.count,
                stat.mean_length,
                stat.std_length,
                stat.min_length,
                stat.max_length,
                stat.mean_time
            ));
        }

        report.push_str("-".repeat(92).as_str());
        report.push('\n');

        report.push_str("\n95% confidence intervals of the mean length:\n");
        for stat in self.statistics() {
            report.push_str(&format!(
                "  {:<18} {:.6} +/- {:.6}\n",
                stat.algorithm, stat.mean_length, stat.ci95_half_width
            ));
        }

        let improvements = self.improvements();
        if !improvements.is_empty() {
            report.push_str("\nImprovements:\n");
            for imp in improvements {
                report.push_str(&format!("  {} vs {}: {:+.2}%\n", imp.better, imp.baseline, imp.percent));
            }
        }

        let gaps = self.gaps_to_optimum();
        if !gaps.is_empty() {
            let proven = self
                .results
                .iter()
                .filter(|r| r.algorithm.is_exact() && r.optimal == Some(true))
                .count();
            report.push_str(&format!(
                "\nGap to the exact solution ({} of {} proven optimal):\n",
                proven,
                self.lengths(Algorithm::BranchAndBound).len()
            ));
            for (algorithm, gap) in gaps {
                report.push_str(&format!("  {:<18} {:+.2}%\n", algorithm, gap));
            }
        }

        report
    }
}
