//! Visualization utilities for tours.
//!
//! Generates SVG drawings of tours (single or side by side) and text exports for
//! external plotting.

use crate::graph::Graph;
use crate::solution::Solution;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
#[cfg(feature = "resvg")]
use resvg::render;
#[cfg(feature = "resvg")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "resvg")]
use resvg::usvg;
#[cfg(feature = "resvg")]
use resvg::usvg::TreeParsing;
#[cfg(feature = "resvg")]
use resvg::FitTo;

/// Edge colours cycled through by the comparison view
const PALETTE: [&str; 6] = ["#2980b9", "#27ae60", "#8e44ad", "#c0392b", "#d35400", "#16a085"];

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width of a single tour drawing
    pub width: f64,
    /// Canvas height of a single tour drawing
    pub height: f64,
    pub margin: f64,
    pub node_radius: f64,
    /// Vertex labels are drawn only up to this many points
    pub max_labels: usize,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 6.0,
            max_labels: 60,
        }
    }
}

/// Maps graph coordinates into a rectangle of the canvas, y axis pointing up.
struct Frame {
    left: f64,
    bottom: f64,
    min_x: f64,
    min_y: f64,
    scale: f64,
}

impl Frame {
    fn new(graph: &Graph, left: f64, top: f64, width: f64, height: f64) -> Self {
        let (min_x, max_x, min_y, max_y) = graph.bounds();
        let span_x = if max_x > min_x { max_x - min_x } else { 1.0 };
        let span_y = if max_y > min_y { max_y - min_y } else { 1.0 };
        let scale = (width / span_x).min(height / span_y);

        Frame {
            left,
            bottom: top + height,
            min_x,
            min_y,
            scale,
        }
    }

    fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (self.left + (x - self.min_x) * self.scale, self.bottom - (y - self.min_y) * self.scale)
    }
}

fn svg_header(width: f64, height: f64) -> String {
    format!(
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .node {{ fill: #e74c3c; stroke: #2c3e50; stroke-width: 1.5; }}
    .start {{ fill: #f1c40f; stroke: #2c3e50; stroke-width: 2; }}
    .edge {{ stroke-width: 2; fill: none; stroke-opacity: 0.8; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
        width, height, width, height
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `width="..."` and `height="..."` of the root element
#[cfg(feature = "resvg")]
fn svg_size(svg: &str) -> Option<(u32, u32)> {
    let attr = |name: &str| -> Option<f64> {
        let (_, rest) = svg.split_once(&format!("{}=\"", name))?;
        let (value, _) = rest.split_once('"')?;
        value.parse::<f64>().ok()
    };
    Some((attr("width")? as u32, attr("height")? as u32))
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate SVG visualization of a solution
    pub fn generate_svg(&self, graph: &Graph, solution: &Solution) -> String {
        let mut svg = svg_header(self.width, self.height);
        self.draw_panel(&mut svg, graph, solution, PALETTE[0], 0.0, 0.0, self.width, self.height);
        svg.push_str("</svg>");
        svg
    }

    /// Several tours of the same graph in a grid of at most two columns
    pub fn generate_comparison_svg(&self, graph: &Graph, solutions: &[Solution]) -> String {
        let columns = solutions.len().clamp(1, 2);
        let rows = solutions.len().div_ceil(2).max(1);
        let width = self.width * columns as f64;
        let height = self.height * rows as f64;

        let mut svg = svg_header(width, height);
        for (k, solution) in solutions.iter().enumerate() {
            let left = (k % 2) as f64 * self.width;
            let top = (k / 2) as f64 * self.height;
            let colour = PALETTE[k % PALETTE.len()];
            self.draw_panel(&mut svg, graph, solution, colour, left, top, self.width, self.height);
        }
        svg.push_str("</svg>");
        svg
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_panel(
        &self,
        svg: &mut String,
        graph: &Graph,
        solution: &Solution,
        colour: &str,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
    ) {
        let frame = Frame::new(
            graph,
            left + self.margin,
            top + self.margin,
            width - 2.0 * self.margin,
            height - 2.0 * self.margin,
        );

        svg.push_str(&format!(
            r#"<text x="{}" y="{}" class="title">{} | {} | Length: {:.4}</text>
"#,
            left + self.margin,
            top + 25.0,
            escape(graph.name()),
            escape(&solution.algorithm),
            solution.length
        ));

        let tour = &solution.tour;
        if tour.len() > 1 {
            let mut path = String::new();
            for (i, &v) in tour.iter().chain(tour.first()).enumerate() {
                let p = graph.point(v);
                let (x, y) = frame.map(p.x, p.y);
                let op = if i == 0 { "M" } else { " L" };
                path.push_str(&format!("{} {:.2} {:.2}", op, x, y));
            }
            svg.push_str(&format!(
                r#"<path d="{}" class="edge" stroke="{}"/>
"#,
                path, colour
            ));
        }

        let start = tour.first().copied();
        for (idx, p) in graph.points().iter().enumerate() {
            let (x, y) = frame.map(p.x, p.y);
            let class = if Some(idx) == start { "start" } else { "node" };
            svg.push_str(&format!(
                r#"<circle cx="{:.2}" cy="{:.2}" r="{}" class="{}"/>
"#,
                x, y, self.node_radius, class
            ));

            if graph.n() <= self.max_labels {
                svg.push_str(&format!(
                    r#"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"#,
                    x,
                    y - self.node_radius - 3.0,
                    idx
                ));
            }
        }
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG, natively with the `resvg` feature, otherwise through an
    /// external converter (`rsvg-convert`, then `magick`, then `inkscape`).
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let path = path.as_ref();

        #[cfg(feature = "resvg")]
        {
            match self.render_native(svg, path) {
                Ok(()) => return Ok(()),
                Err(e) => log::warn!("native rendering failed ({}), trying external converters", e),
            }
        }

        self.convert_externally(svg, path)
    }

    #[cfg(feature = "resvg")]
    fn render_native(&self, svg: &str, path: &Path) -> std::io::Result<()> {
        let opt = usvg::Options::default();
        let rtree = usvg::Tree::from_str(svg, &opt)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, format!("usvg parse error: {}", e)))?;
        let (w, h) = svg_size(svg).unwrap_or((self.width as u32, self.height as u32));
        let mut pixmap = Pixmap::new(w.max(1), h.max(1))
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "failed to create pixmap"))?;
        render(&rtree, FitTo::Original, Transform::default(), pixmap.as_mut())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "resvg render failed"))?;
        pixmap
            .save_png(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("save_png failed: {}", e)))
    }

    fn convert_externally(&self, svg: &str, path: &Path) -> std::io::Result<()> {
        let tmp_svg = path.with_extension("svg.tmp");
        std::fs::write(&tmp_svg, svg)?;

        let out = path.to_string_lossy().into_owned();
        let tmp = tmp_svg.to_string_lossy().into_owned();
        let attempts: [(&str, Vec<&str>); 3] = [
            ("rsvg-convert", vec!["-o", out.as_str(), tmp.as_str()]),
            ("magick", vec!["convert", tmp.as_str(), out.as_str()]),
            ("inkscape", vec![tmp.as_str(), "--export-type=png", "--export-filename", out.as_str()]),
        ];

        for (program, args) in &attempts {
            if let Ok(status) = Command::new(program).args(args).status() {
                if status.success() {
                    let _ = std::fs::remove_file(&tmp_svg);
                    return Ok(());
                }
            }
            log::debug!("{} unavailable or failed", program);
        }

        let _ = std::fs::remove_file(&tmp_svg);
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no SVG->PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
        ))
    }

    /// Export data for external plotting (e.g., matplotlib)
    pub fn export_plot_data(&self, graph: &Graph, solution: &Solution) -> String {
        let mut data = String::new();

        data.push_str("# TSP Tour Data\n");
        data.push_str(&format!("# Instance: {}\n", graph.name()));
        data.push_str(&format!("# Algorithm: {}\n", solution.algorithm));
        data.push_str(&format!("# Length: {:.6}\n\n", solution.length));

        data.push_str("# Points: id, x, y\n");
        for (idx, p) in graph.points().iter().enumerate() {
            data.push_str(&format!("{},{},{}\n", idx, p.x, p.y));
        }

        data.push_str("\n# Tour: sequence of point ids\n");
        let tour_str: Vec<String> = solution.tour.iter().map(|v| v.to_string()).collect();
        data.push_str(&tour_str.join(","));
        data.push('\n');

        data
    }
}

/// Write one plot-data file per solution plus `comparison.csv` into `dir`.
///
/// Files are named after the algorithm (`NearestNeighbor.dat`, ...); returns the
/// paths written, the comparison table last.
pub fn export_plot_files<P: AsRef<Path>>(
    viz: &Visualizer,
    graph: &Graph,
    solutions: &[Solution],
    dir: P,
) -> std::io::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(solutions.len() + 1);
    for solution in solutions {
        let path = dir.join(format!("{}.dat", solution.algorithm));
        std::fs::write(&path, viz.export_plot_data(graph, solution))?;
        written.push(path);
    }

    let path = dir.join("comparison.csv");
    std::fs::write(&path, generate_comparison_data(solutions))?;
    written.push(path);

    log::debug!("plot data for {} solutions written to {:?}", solutions.len(), dir);
    Ok(written)
}

/// Generate comparison plot data for multiple solutions
pub fn generate_comparison_data(solutions: &[Solution]) -> String {
    let mut data = String::new();

    data.push_str("# Algorithm Comparison\n");
    data.push_str("algorithm,length,time,iterations\n");

    for sol in solutions {
        let iterations = sol.iterations.map(|i| i.to_string()).unwrap_or_default();
        data.push_str(&format!(
            "{},{:.6},{:.6},{}\n",
            sol.algorithm, sol.length, sol.computation_time, iterations
        ));
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::unit_square;

    #[test]
    fn test_visualizer() {
        let graph = unit_square().with_name("square");
        let solution = Solution::from_tour(&graph, vec![0, 1, 2, 3], "test");

        let viz = Visualizer::new();
        let svg = viz.generate_svg(&graph, &solution);

        assert!(svg.starts_with("<?xml"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("square | test | Length: 4.0000"));
        assert_eq!(svg.matches("<circle").count(), 4);
        assert_eq!(svg.matches(r#"class="start""#).count(), 1);
    }

    #[test]
    fn test_comparison_grid() {
        let graph = unit_square();
        let solutions: Vec<Solution> = [vec![0, 1, 2, 3], vec![0, 2, 1, 3], vec![3, 2, 1, 0]]
            .into_iter()
            .map(|tour| Solution::from_tour(&graph, tour, "t"))
            .collect();

        let svg = Visualizer::new().generate_comparison_svg(&graph, &solutions);
        assert!(svg.contains(r#"width="1600" height="1600""#));
        assert_eq!(svg.matches("<path").count(), 3);
    }

    #[test]
    fn test_plot_data() {
        let graph = unit_square();
        let solution = Solution::from_tour(&graph, vec![0, 3, 2, 1], "test");

        let data = Visualizer::new().export_plot_data(&graph, &solution);
        assert!(data.contains("0,3,2,1\n"));
        assert!(data.contains("2,1,1\n"));

        let table = generate_comparison_data(&[solution]);
        assert!(table.contains("test,4.000000,"));
    }

    #[test]
    fn test_export_plot_files() {
        let graph = unit_square();
        let solutions = vec![
            Solution::from_tour(&graph, vec![0, 1, 2, 3], "NearestNeighbor"),
            Solution::from_tour(&graph, vec![0, 2, 1, 3], "TwoOpt"),
        ];
        let dir = std::env::temp_dir().join(format!("tsp-plot-data-{}", std::process::id()));

        let written = export_plot_files(&Visualizer::new(), &graph, &solutions, &dir).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[1], dir.join("TwoOpt.dat"));

        let table = std::fs::read_to_string(dir.join("comparison.csv")).unwrap();
        assert_eq!(table.lines().count(), 4);
        let data = std::fs::read_to_string(&written[0]).unwrap();
        assert!(data.contains("# Algorithm: NearestNeighbor"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
