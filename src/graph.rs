//! Complete Euclidean graph over a set of planar points.
//!
//! A [`Graph`] owns its points and the full pairwise distance matrix, which is
//! computed once at construction and never mutated afterwards. Graphs are built
//! from an explicit point list, from a count of uniformly random points in the
//! unit square, or from a text file with one point per line.

use crate::error::{Result, TspError};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A point in the plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    #[inline]
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point { x, y }
    }
}

/// Complete weighted graph with Euclidean edge lengths
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    points: Vec<Point>,
    distance_matrix: Vec<Vec<f64>>,
}

impl Graph {
    /// Build a graph from an explicit, non-empty list of finite coordinates.
    pub fn from_points(points: Vec<Point>) -> Result<Self> {
        if points.is_empty() {
            return Err(TspError::invalid_input("point list is empty"));
        }
        if let Some(idx) = points.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(TspError::invalid_input(format!(
                "point {} has non-finite coordinates ({}, {})",
                idx, points[idx].x, points[idx].y
            )));
        }
        Ok(Self::build("points".to_string(), points))
    }

    /// Generate `n` points uniformly at random in `[0, 1) x [0, 1)`.
    pub fn random<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let points = (0..n).map(|_| Point::new(rng.gen::<f64>(), rng.gen::<f64>())).collect();
        Self::build(format!("random-{}", n), points)
    }

    /// Reproducible random instance.
    pub fn with_seed(n: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut graph = Self::random(n, &mut rng);
        graph.name = format!("random-{}-seed{}", n, seed);
        graph
    }

    fn build(name: String, points: Vec<Point>) -> Self {
        let distance_matrix = Self::compute_distance_matrix(&points);
        Graph { name, points, distance_matrix }
    }

    /// Compute Euclidean distance matrix
    fn compute_distance_matrix(points: &[Point]) -> Vec<Vec<f64>> {
        let n = points.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in i + 1..n {
                let d = points[i].distance_to(&points[j]);
                matrix[i][j] = d;
                matrix[j][i] = d;
            }
        }

        matrix
    }

    /// Parse points from text: one point per line, `(x, y)` or `x y`.
    /// Blank lines are skipped, anything else that does not yield two numbers is rejected.
    pub fn parse_points<R: BufRead>(reader: R) -> Result<Vec<Point>> {
        let mut points = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let cleaned = line.replace(['(', ')', ','], " ");
            let coords: Vec<&str> = cleaned.split_whitespace().collect();
            if coords.len() != 2 {
                return Err(TspError::invalid_input(format!(
                    "line {}: expected two coordinates, got {:?}",
                    line_no + 1,
                    line
                )));
            }

            let parse = |s: &str| -> Result<f64> {
                s.parse::<f64>().map_err(|_| {
                    TspError::invalid_input(format!("line {}: invalid coordinate {:?}", line_no + 1, s))
                })
            };
            points.push(Point::new(parse(coords[0])?, parse(coords[1])?));
        }

        Ok(points)
    }

    /// Load a graph from a point file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let points = Self::parse_points(BufReader::new(file))?;
        let mut graph = Self::from_points(points)?;
        if let Some(stem) = path.file_stem() {
            graph.name = stem.to_string_lossy().into_owned();
        }
        log::debug!("loaded {} points from {}", graph.n(), path.display());
        Ok(graph)
    }

    /// Save the points as `(x, y)` lines, readable by [`Graph::load_from_file`].
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for p in &self.points {
            writeln!(writer, "({}, {})", p.x, p.y)?;
        }
        writer.flush()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of vertices
    #[inline]
    pub fn n(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn point(&self, idx: usize) -> Point {
        self.points[idx]
    }

    /// Get the distance between two vertices
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix[i][j]
    }

    /// Total length of the closed cycle visiting `tour` in order.
    pub fn tour_length(&self, tour: &[usize]) -> f64 {
        let len = tour.len();
        (0..len)
            .map(|k| self.distance(tour[k], tour[(k + 1) % len]))
            .sum()
    }

    /// True if `tour` visits every vertex exactly once.
    pub fn is_hamiltonian(&self, tour: &[usize]) -> bool {
        if tour.len() != self.n() {
            return false;
        }
        let mut seen = vec![false; self.n()];
        for &v in tour {
            if v >= self.n() || seen[v] {
                return false;
            }
            seen[v] = true;
        }
        true
    }

    /// Reject a start vertex outside `[0, n)`.
    pub fn check_vertex(&self, vertex: usize) -> Result<()> {
        if vertex >= self.n() {
            return Err(TspError::invalid_input(format!(
                "vertex {} out of range (graph has {} vertices)",
                vertex,
                self.n()
            )));
        }
        Ok(())
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> GraphStatistics {
        let n = self.n();
        let mut total = 0.0;
        let mut count = 0usize;
        let mut min_distance = f64::INFINITY;
        let mut max_distance: f64 = 0.0;
        for i in 0..n {
            for j in i + 1..n {
                let d = self.distance(i, j);
                total += d;
                count += 1;
                min_distance = min_distance.min(d);
                max_distance = max_distance.max(d);
            }
        }
        let avg_distance = if count > 0 { total / count as f64 } else { 0.0 };
        if count == 0 {
            min_distance = 0.0;
        }

        let (min_x, max_x, min_y, max_y) = self.bounds();

        GraphStatistics {
            name: self.name.clone(),
            n,
            avg_distance,
            min_distance,
            max_distance,
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Coordinate bounding box `(min_x, max_x, min_y, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        if self.points.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }
        self.points.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(min_x, max_x, min_y, max_y), p| (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y)),
        )
    }
}

/// Validating constructor mirroring the command-line surface: either a point list or
/// a point count, never both, never neither.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    points: Option<Vec<Point>>,
    count: Option<i64>,
    seed: Option<u64>,
    name: Option<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(mut self, points: Vec<Point>) -> Self {
        self.points = Some(points);
        self
    }

    pub fn count(mut self, n: i64) -> Self {
        self.count = Some(n);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Graph> {
        let graph = match (self.points, self.count) {
            (Some(_), Some(_)) => {
                return Err(TspError::invalid_input("supply either a point list or a point count, not both"))
            }
            (None, None) => return Err(TspError::invalid_input("supply either a point list or a point count")),
            (Some(points), None) => Graph::from_points(points)?,
            (None, Some(n)) if n < 0 => {
                return Err(TspError::invalid_input(format!("point count must be non-negative, got {}", n)))
            }
            (None, Some(n)) => match self.seed {
                Some(seed) => Graph::with_seed(n as usize, seed),
                None => Graph::random(n as usize, &mut rand::thread_rng()),
            },
        };

        Ok(match self.name {
            Some(name) => graph.with_name(name),
            None => graph,
        })
    }
}

/// Statistics about a graph instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub name: String,
    pub n: usize,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl std::fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Points: {}", self.n)?;
        writeln!(f, "  Bounding box: [{:.4}, {:.4}] x [{:.4}, {:.4}]", self.min_x, self.max_x, self.min_y, self.max_y)?;
        writeln!(f, "  Avg distance: {:.4}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.4}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.4}", self.max_distance)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unit square, counter-clockwise from the origin.
    pub(crate) fn unit_square() -> Graph {
        Graph::from_points(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_distance_calculation() {
        let graph = Graph::from_points(vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0)]).unwrap();

        assert!((graph.distance(0, 1) - 5.0).abs() < 1e-10);
        assert!((graph.distance(1, 0) - 5.0).abs() < 1e-10);
        assert_eq!(graph.distance(0, 0), 0.0);
    }

    #[test]
    fn test_matrix_symmetric() {
        let graph = Graph::with_seed(25, 7);
        for i in 0..graph.n() {
            assert_eq!(graph.distance(i, i), 0.0);
            for j in 0..graph.n() {
                assert_eq!(graph.distance(i, j), graph.distance(j, i));
                assert!(graph.distance(i, j) >= 0.0);
            }
        }
    }

    #[test]
    fn test_random_points_in_unit_square() {
        let graph = Graph::with_seed(100, 1);
        assert_eq!(graph.n(), 100);
        assert!(graph.points().iter().all(|p| (0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y)));

        let again = Graph::with_seed(100, 1);
        assert_eq!(graph.points(), again.points());
    }

    #[test]
    fn test_tour_length_closes_cycle() {
        let graph = unit_square();
        assert!((graph.tour_length(&[0, 1, 2, 3]) - 4.0).abs() < 1e-12);
        assert!((graph.tour_length(&[0, 2, 1, 3]) - (2.0 + 2.0 * 2f64.sqrt())).abs() < 1e-12);
        assert_eq!(graph.tour_length(&[]), 0.0);
        assert_eq!(graph.tour_length(&[2]), 0.0);
    }

    #[test]
    fn test_tour_length_rotation_and_reversal() {
        let graph = Graph::with_seed(12, 3);
        let tour: Vec<usize> = vec![4, 0, 11, 7, 2, 9, 1, 5, 10, 3, 8, 6];
        let length = graph.tour_length(&tour);

        for shift in 0..tour.len() {
            let mut rotated = tour.clone();
            rotated.rotate_left(shift);
            assert!((graph.tour_length(&rotated) - length).abs() < 1e-9);
        }

        let mut reversed = tour.clone();
        reversed.reverse();
        assert!((graph.tour_length(&reversed) - length).abs() < 1e-9);
    }

    #[test]
    fn test_is_hamiltonian() {
        let graph = unit_square();
        assert!(graph.is_hamiltonian(&[2, 0, 3, 1]));
        assert!(!graph.is_hamiltonian(&[0, 1, 2]));
        assert!(!graph.is_hamiltonian(&[0, 1, 2, 2]));
        assert!(!graph.is_hamiltonian(&[0, 1, 2, 4]));
        assert!(!graph.is_hamiltonian(&[0, 1, 2, 3, 0]));
    }

    #[test]
    fn test_builder_errors() {
        let err = GraphBuilder::new().build().unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));

        let err = GraphBuilder::new().count(-3).build().unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));

        let err = GraphBuilder::new()
            .count(3)
            .points(vec![Point::new(0.0, 0.0)])
            .build()
            .unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));

        let err = GraphBuilder::new().points(Vec::new()).build().unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));

        let err = Graph::from_points(vec![Point::new(f64::NAN, 0.0)]).unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));
    }

    #[test]
    fn test_builder_count_and_seed() {
        let graph = GraphBuilder::new().count(8).seed(5).build().unwrap();
        assert_eq!(graph.n(), 8);
        assert_eq!(graph.points(), Graph::with_seed(8, 5).points());

        let empty = GraphBuilder::new().count(0).build().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_parse_points_formats() {
        let text = "(0.5, 1.5)\n\n  2 3  \n(4.0,5.0)\n";
        let points = Graph::parse_points(text.as_bytes()).unwrap();
        assert_eq!(points, vec![Point::new(0.5, 1.5), Point::new(2.0, 3.0), Point::new(4.0, 5.0)]);
    }

    #[test]
    fn test_parse_points_rejects_malformed() {
        let err = Graph::parse_points("1 2\n3\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = Graph::parse_points("1 abc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let graph = Graph::with_seed(6, 11);
        let path = std::env::temp_dir().join(format!("tsp-solver-points-{}.txt", std::process::id()));
        graph.save_to_file(&path).unwrap();

        let loaded = Graph::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.n(), 6);
        for (a, b) in graph.points().iter().zip(loaded.points()) {
            assert!((a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_statistics() {
        let stats = unit_square().statistics();
        assert_eq!(stats.n, 4);
        assert!((stats.min_distance - 1.0).abs() < 1e-12);
        assert!((stats.max_distance - 2f64.sqrt()).abs() < 1e-12);
        assert!((stats.max_x - 1.0).abs() < 1e-12);
    }
}
