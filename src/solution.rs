//! Solution representation and manipulation.
//!
//! A [`Solution`] is a tour (vertex indices, read as a cycle) together with its
//! length and some bookkeeping about the algorithm that produced it.

use crate::error::{Result, TspError};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};

/// A closed tour over the vertices of a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Visiting order; the last vertex connects back to the first
    pub tour: Vec<usize>,
    /// Total cycle length
    pub length: f64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            tour: Vec::new(),
            length: 0.0,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Create a solution from a tour, measuring its length on `graph`
    pub fn from_tour(graph: &Graph, tour: Vec<usize>, algorithm: &str) -> Self {
        let length = graph.tour_length(&tour);
        Solution {
            tour,
            length,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Recompute the length from scratch
    pub fn validate(&mut self, graph: &Graph) {
        self.length = graph.tour_length(&self.tour);
    }

    /// Check if all vertices are visited exactly once
    pub fn is_complete(&self, graph: &Graph) -> bool {
        graph.is_hamiltonian(&self.tour)
    }

    /// Fail with a structural error if an algorithm produced a non-permutation.
    pub fn ensure_complete(&self, graph: &Graph) -> Result<()> {
        if self.is_complete(graph) {
            Ok(())
        } else {
            Err(TspError::invariant(format!(
                "{} produced a tour of {} entries that is not a permutation of {} vertices",
                self.algorithm,
                self.tour.len(),
                graph.n()
            )))
        }
    }

    /// Length gained by reversing `tour[i + 1..=j]`; positive means shorter.
    ///
    /// Only the two removed edges `(t[i], t[i+1])`, `(t[j], t[j+1])` and the two
    /// added edges `(t[i], t[j])`, `(t[i+1], t[j+1])` are looked at.
    pub fn two_opt_gain(&self, graph: &Graph, i: usize, j: usize) -> f64 {
        let n = self.tour.len();
        let a = self.tour[i];
        let b = self.tour[(i + 1) % n];
        let c = self.tour[j];
        let d = self.tour[(j + 1) % n];

        let removed = graph.distance(a, b) + graph.distance(c, d);
        let added = graph.distance(a, c) + graph.distance(b, d);
        removed - added
    }

    /// Apply a 2-opt move (reverse segment between i+1 and j)
    pub fn apply_two_opt(&mut self, i: usize, j: usize) {
        self.tour[i + 1..=j].reverse();
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Length: {:.6}", self.length)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Tour: {}", format_tour(&self.tour, 10))
    }
}

/// `0 -> 3 -> 1 -> ... -> 0`, truncated after `max_shown` vertices.
pub fn format_tour(tour: &[usize], max_shown: usize) -> String {
    if tour.is_empty() {
        return "(empty)".to_string();
    }
    let shown: Vec<String> = tour.iter().take(max_shown).map(|v| v.to_string()).collect();
    let ellipsis = if tour.len() > max_shown { " -> ..." } else { "" };
    format!("{}{} -> {}", shown.join(" -> "), ellipsis, tour[0])
}
