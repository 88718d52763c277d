//! Local search improvement heuristics.
//!
//! This module implements 2-opt edge exchange in two flavours:
//! - first improvement, restarting the scan after every applied move (default)
//! - best improvement, applying the best move of each pass, with an optional cap
//!   on the number of passes for large instances
//!
//! It also provides the planar segment-crossing test used to count crossing edges.

use crate::error::{Result, TspError};
use crate::graph::{Graph, Point};
use crate::solution::Solution;

/// Minimum gain for a move to count as an improvement; filters out float no-ops.
pub const IMPROVEMENT_EPSILON: f64 = 1e-10;

/// Trait for local search improvement methods
pub trait LocalSearch {
    /// Improve `solution` in place. Returns whether its length went down.
    fn improve(&self, graph: &Graph, solution: &mut Solution) -> Result<bool>;
    fn name(&self) -> &str;
}

/// 2-Opt Local Search
///
/// Reverses segments of the tour to reduce total distance, which in the
/// Euclidean plane removes every pair of crossing edges.
pub struct TwoOptSearch {
    /// Use first improvement instead of best improvement
    pub first_improvement: bool,
    /// Maximum number of passes; `None` runs until convergence
    pub max_iterations: Option<usize>,
}

impl TwoOptSearch {
    pub fn new() -> Self {
        TwoOptSearch {
            first_improvement: true,
            max_iterations: None,
        }
    }

    pub fn best_improvement(max_iterations: usize) -> Self {
        TwoOptSearch {
            first_improvement: false,
            max_iterations: Some(max_iterations),
        }
    }

    /// Run the search on a copy of `tour` and return the improved solution.
    pub fn optimize(&self, graph: &Graph, tour: &[usize]) -> Result<Solution> {
        let start = std::time::Instant::now();
        let mut solution = Solution::from_tour(graph, tour.to_vec(), self.name());
        self.improve(graph, &mut solution)?;
        solution.algorithm = self.name().to_string();
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    /// All `(i, j)` edge pairs considered by a pass, in scan order.
    fn candidate_moves(n: usize) -> impl Iterator<Item = (usize, usize)> {
        (0..n).flat_map(move |i| (i + 2..n).map(move |j| (i, j))).filter(move |&(i, j)| !(i == 0 && j == n - 1))
    }

    fn find_first(&self, graph: &Graph, solution: &Solution) -> Option<(usize, usize)> {
        Self::candidate_moves(solution.tour.len()).find(|&(i, j)| solution.two_opt_gain(graph, i, j) > IMPROVEMENT_EPSILON)
    }

    fn find_best(&self, graph: &Graph, solution: &Solution) -> Option<(usize, usize)> {
        let mut best = None;
        let mut best_gain = IMPROVEMENT_EPSILON;

        for (i, j) in Self::candidate_moves(solution.tour.len()) {
            let gain = solution.two_opt_gain(graph, i, j);
            if gain > best_gain {
                best_gain = gain;
                best = Some((i, j));
            }
        }

        best
    }
}

impl Default for TwoOptSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for TwoOptSearch {
    fn improve(&self, graph: &Graph, solution: &mut Solution) -> Result<bool> {
        if !graph.is_hamiltonian(&solution.tour) {
            return Err(TspError::invalid_input(format!(
                "initial tour of {} entries is not a permutation of {} vertices",
                solution.tour.len(),
                graph.n()
            )));
        }

        let initial_length = graph.tour_length(&solution.tour);
        let mut moves = 0usize;
        let mut passes = 0usize;

        loop {
            if self.max_iterations.is_some_and(|max| passes >= max) {
                log::debug!("{}: stopped after {} passes", self.name(), passes);
                break;
            }
            passes += 1;

            let found = if self.first_improvement {
                self.find_first(graph, solution)
            } else {
                self.find_best(graph, solution)
            };

            match found {
                Some((i, j)) => {
                    solution.apply_two_opt(i, j);
                    moves += 1;
                }
                None => break,
            }
        }

        solution.validate(graph);
        solution.iterations = Some(moves);
        log::debug!(
            "{}: {:.6} -> {:.6} in {} moves",
            self.name(),
            initial_length,
            solution.length,
            moves
        );

        Ok(solution.length < initial_length)
    }

    fn name(&self) -> &str {
        if self.first_improvement {
            "2-Opt"
        } else {
            "2-Opt-BI"
        }
    }
}

/// Strict orientation test: is `c` counter-clockwise of the ray `a -> b`?
fn ccw(a: Point, b: Point, c: Point) -> bool {
    (c.y - a.y) * (b.x - a.x) > (b.y - a.y) * (c.x - a.x)
}

/// Whether edges `(t[i], t[i+1])` and `(t[j], t[j+1])` properly cross in the plane.
pub fn segments_cross(graph: &Graph, tour: &[usize], i: usize, j: usize) -> bool {
    let n = tour.len();
    let p1 = graph.point(tour[i]);
    let p2 = graph.point(tour[(i + 1) % n]);
    let p3 = graph.point(tour[j]);
    let p4 = graph.point(tour[(j + 1) % n]);

    ccw(p1, p3, p4) != ccw(p2, p3, p4) && ccw(p1, p2, p3) != ccw(p1, p2, p4)
}

/// Number of non-adjacent edge pairs of the tour that cross each other.
pub fn count_crossings(graph: &Graph, tour: &[usize]) -> usize {
    TwoOptSearch::candidate_moves(tour.len())
        .filter(|&(i, j)| segments_cross(graph, tour, i, j))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::unit_square;
    use crate::heuristics::construction::{ConstructionHeuristic, NearestNeighborHeuristic};
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn shuffled_tour(n: usize, seed: u64) -> Vec<usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut tour: Vec<usize> = (0..n).collect();
        tour.shuffle(&mut rng);
        tour
    }

    #[test]
    fn test_two_opt_uncrosses_square() {
        let graph = unit_square();
        let solution = TwoOptSearch::new().optimize(&graph, &[0, 2, 1, 3]).unwrap();

        assert!((solution.length - 4.0).abs() < 1e-12);
        assert_eq!(solution.iterations, Some(1));
    }

    #[test]
    fn test_two_opt_never_increases_length() {
        for seed in 0..5 {
            let graph = Graph::with_seed(40, seed);
            let tour = shuffled_tour(40, seed + 100);
            let before = graph.tour_length(&tour);

            let solution = TwoOptSearch::new().optimize(&graph, &tour).unwrap();

            assert!(graph.is_hamiltonian(&solution.tour));
            assert!(solution.length <= before + 1e-12);
        }
    }

    #[test]
    fn test_two_opt_fixed_point() {
        let graph = Graph::with_seed(35, 4);
        let initial = NearestNeighborHeuristic::new(0).construct(&graph).unwrap();
        let first = TwoOptSearch::new().optimize(&graph, &initial.tour).unwrap();
        let second = TwoOptSearch::new().optimize(&graph, &first.tour).unwrap();

        assert_eq!(first.tour, second.tour);
        assert_eq!(second.iterations, Some(0));
    }

    #[test]
    fn test_two_opt_removes_crossings() {
        let graph = Graph::with_seed(50, 21);
        let tour = shuffled_tour(50, 3);
        assert!(count_crossings(&graph, &tour) > 0);

        let solution = TwoOptSearch::new().optimize(&graph, &tour).unwrap();
        assert_eq!(count_crossings(&graph, &solution.tour), 0);
    }

    #[test]
    fn test_best_improvement_respects_cap() {
        let graph = Graph::with_seed(40, 8);
        let tour = shuffled_tour(40, 8);
        let before = graph.tour_length(&tour);

        let capped = TwoOptSearch::best_improvement(3).optimize(&graph, &tour).unwrap();
        assert!(capped.iterations.unwrap() <= 3);
        assert!(capped.length < before);

        let full = TwoOptSearch::best_improvement(usize::MAX).optimize(&graph, &tour).unwrap();
        assert_eq!(count_crossings(&graph, &full.tour), 0);
    }

    #[test]
    fn test_rejects_invalid_tour() {
        let graph = unit_square();
        let err = TwoOptSearch::new().optimize(&graph, &[0, 1, 1, 2]).unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));
    }

    #[test]
    fn test_segments_cross() {
        let graph = unit_square();
        // (0,0)-(1,1) against (1,0)-(0,1): the two diagonals
        assert!(segments_cross(&graph, &[0, 2, 1, 3], 0, 2));
        // perimeter edges (0,0)-(1,0) and (1,1)-(0,1) are parallel
        assert!(!segments_cross(&graph, &[0, 1, 2, 3], 0, 2));
    }

    #[test]
    fn test_small_tours_untouched() {
        let graph = Graph::with_seed(3, 2);
        let solution = TwoOptSearch::new().optimize(&graph, &[2, 0, 1]).unwrap();
        assert_eq!(solution.tour, vec![2, 0, 1]);
        assert_eq!(solution.iterations, Some(0));
    }

    #[test]
    fn test_degenerate_sizes() {
        let empty = Graph::with_seed(0, 1);
        let solution = TwoOptSearch::new().optimize(&empty, &[]).unwrap();
        assert!(solution.tour.is_empty());
        assert_eq!(solution.length, 0.0);

        let single = Graph::with_seed(1, 1);
        let solution = TwoOptSearch::best_improvement(10).optimize(&single, &[0]).unwrap();
        assert_eq!(solution.tour, vec![0]);
        assert_eq!(solution.length, 0.0);

        let pair = Graph::with_seed(2, 1);
        let solution = TwoOptSearch::new().optimize(&pair, &[1, 0]).unwrap();
        assert_eq!(solution.tour, vec![1, 0]);
        assert_eq!(solution.iterations, Some(0));
        assert!((solution.length - 2.0 * pair.distance(0, 1)).abs() < 1e-12);
    }
}
