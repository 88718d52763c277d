//! Best-first branch and bound.
//!
//! Partial paths rooted at the start vertex are expanded in order of their lower
//! bound. A node whose bound reaches the incumbent length is discarded together
//! with its whole subtree, so once the frontier holds nothing below the incumbent
//! the incumbent is optimal.

use crate::error::{Result, TspError};
use crate::graph::Graph;
use crate::solution::Solution;
use crossbeam_channel::RecvTimeoutError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Nodes popped between two deadline checks
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// Extra time the worker of [`BranchAndBoundSolver::solve_with_timeout`] gets past
/// the caller's timeout, so that the caller always gives up first.
const TIMEOUT_GRACE: Duration = Duration::from_millis(100);

/// Lower-bound estimator for a partial path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LowerBound {
    /// Half the two cheapest incident edges of every unvisited vertex, plus half
    /// the cheapest links from the path ends into the unvisited set
    #[default]
    HalfSum,
    /// Cheapest edge out of the path plus `k - 1` copies of the cheapest edge
    /// among the `k` unvisited vertices
    Simple,
}

impl LowerBound {
    /// Bound on the length of any tour extending `path` through `remaining`.
    ///
    /// `path` must be non-empty and `cost` must be its length.
    pub fn estimate(self, graph: &Graph, path: &[usize], remaining: &[usize], cost: f64) -> f64 {
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            return cost;
        };
        if remaining.is_empty() {
            return cost + graph.distance(last, first);
        }

        match self {
            LowerBound::HalfSum => half_sum(graph, path, remaining, cost, first, last),
            LowerBound::Simple => simple(graph, remaining, cost, last),
        }
    }
}

impl std::fmt::Display for LowerBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LowerBound::HalfSum => write!(f, "half-sum"),
            LowerBound::Simple => write!(f, "simple"),
        }
    }
}

fn half_sum(graph: &Graph, path: &[usize], remaining: &[usize], cost: f64, first: usize, last: usize) -> f64 {
    let mut bound = cost;

    for &v in remaining {
        let mut smallest = f64::INFINITY;
        let mut second = f64::INFINITY;
        let others = path.iter().chain(remaining.iter()).filter(|&&u| u != v);
        for &u in others {
            let d = graph.distance(v, u);
            if d < smallest {
                second = smallest;
                smallest = d;
            } else if d < second {
                second = d;
            }
        }

        bound += if second.is_finite() {
            (smallest + second) / 2.0
        } else {
            smallest
        };
    }

    let min_out = min_distance_from(graph, last, remaining);
    let min_in = min_distance_from(graph, first, remaining);
    bound + (min_out + min_in) / 2.0
}

fn simple(graph: &Graph, remaining: &[usize], cost: f64, last: usize) -> f64 {
    let mut bound = cost + min_distance_from(graph, last, remaining);

    if remaining.len() > 1 {
        let mut min_pair = f64::INFINITY;
        for (k, &v) in remaining.iter().enumerate() {
            for &u in &remaining[k + 1..] {
                min_pair = min_pair.min(graph.distance(v, u));
            }
        }
        bound += min_pair * (remaining.len() - 1) as f64;
    }

    bound
}

fn min_distance_from(graph: &Graph, vertex: usize, targets: &[usize]) -> f64 {
    targets
        .iter()
        .map(|&t| graph.distance(vertex, t))
        .fold(f64::INFINITY, f64::min)
}

/// Configuration for the branch-and-bound solver
#[derive(Debug, Clone)]
pub struct BranchAndBoundConfig {
    pub lower_bound: LowerBound,
    /// Maximum number of popped nodes; `None` searches until the frontier is exhausted
    pub max_nodes: Option<usize>,
    /// Cooperative deadline, checked every few hundred nodes
    pub time_limit: Option<Duration>,
    /// Vertex every explored path starts from
    pub start: usize,
}

impl Default for BranchAndBoundConfig {
    fn default() -> Self {
        BranchAndBoundConfig {
            lower_bound: LowerBound::HalfSum,
            max_nodes: Some(100_000),
            time_limit: None,
            start: 0,
        }
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    /// No unexplored node can beat the incumbent
    Optimal,
    /// The node budget ran out; the tour is the best found, not proven optimal
    NodeLimit,
    /// The deadline passed; the tour is the best found, not proven optimal
    TimeLimit,
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchStatus::Optimal => write!(f, "optimal"),
            SearchStatus::NodeLimit => write!(f, "node limit reached"),
            SearchStatus::TimeLimit => write!(f, "time limit reached"),
        }
    }
}

/// Result from the exact solver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactResult {
    pub solution: Solution,
    pub status: SearchStatus,
    pub nodes_explored: usize,
    pub nodes_pruned: usize,
    /// Bound of the root node, a lower bound on every tour
    pub root_bound: f64,
    /// Value of `nodes_explored` when the first complete tour was reached
    pub first_incumbent_at: Option<usize>,
}

impl ExactResult {
    pub fn is_optimal(&self) -> bool {
        self.status == SearchStatus::Optimal
    }

    /// Share of generated nodes that were discarded by the bound, in percent.
    pub fn pruning_efficiency(&self) -> f64 {
        let total = self.nodes_explored + self.nodes_pruned;
        if total == 0 {
            0.0
        } else {
            100.0 * self.nodes_pruned as f64 / total as f64
        }
    }

    /// Relative distance between the tour length and the root bound.
    pub fn root_gap(&self) -> f64 {
        if self.solution.length > 0.0 {
            (self.solution.length - self.root_bound) / self.solution.length
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
struct SearchNode {
    path: Vec<usize>,
    /// Unvisited vertices, ascending
    remaining: Vec<usize>,
    cost: f64,
    bound: f64,
}

/// Frontier entry: lowest bound first, then the deepest path, then insertion order.
struct Entry {
    bound: OrderedFloat<f64>,
    depth: usize,
    seq: u64,
    node: SearchNode,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so "greater" means "popped first"
        other
            .bound
            .cmp(&self.bound)
            .then_with(|| self.depth.cmp(&other.depth))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

#[derive(Default)]
struct Frontier {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl Frontier {
    fn push(&mut self, node: SearchNode) {
        let entry = Entry {
            bound: OrderedFloat(node.bound),
            depth: node.path.len(),
            seq: self.next_seq,
            node,
        };
        self.next_seq += 1;
        self.heap.push(entry);
    }

    fn pop(&mut self) -> Option<SearchNode> {
        self.heap.pop().map(|entry| entry.node)
    }

    fn min_bound(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.bound.into_inner())
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Exact solver: best-first branch and bound with a pluggable lower bound
pub struct BranchAndBoundSolver {
    pub config: BranchAndBoundConfig,
}

impl BranchAndBoundSolver {
    pub fn new(config: BranchAndBoundConfig) -> Self {
        BranchAndBoundSolver { config }
    }

    pub fn with_bound(lower_bound: LowerBound) -> Self {
        Self::new(BranchAndBoundConfig {
            lower_bound,
            ..Default::default()
        })
    }

    pub fn name(&self) -> &str {
        "BranchAndBound"
    }

    /// Search for an optimal tour.
    ///
    /// Fails with [`TspError::NoSolution`] when a budget runs out before any
    /// complete tour was reached.
    pub fn solve(&self, graph: &Graph) -> Result<ExactResult> {
        let started = Instant::now();
        let n = graph.n();
        let start = self.config.start;

        if n == 0 {
            return Ok(self.trivial(graph, Vec::new(), started));
        }
        graph.check_vertex(start)?;
        if n <= 2 {
            let mut tour = vec![start];
            tour.extend((0..n).filter(|&v| v != start));
            return Ok(self.trivial(graph, tour, started));
        }

        let deadline = self.config.time_limit.map(|limit| started + limit);
        let lower_bound = self.config.lower_bound;

        let remaining: Vec<usize> = (0..n).filter(|&v| v != start).collect();
        let root_bound = lower_bound.estimate(graph, &[start], &remaining, 0.0);

        let mut frontier = Frontier::default();
        frontier.push(SearchNode {
            path: vec![start],
            remaining,
            cost: 0.0,
            bound: root_bound,
        });

        let mut best_length = f64::INFINITY;
        let mut best_tour: Option<Vec<usize>> = None;
        let mut first_incumbent_at = None;
        let mut nodes_explored = 0usize;
        let mut nodes_pruned = 0usize;
        let mut hit_deadline = false;

        while !frontier.is_empty() {
            if self.config.max_nodes.is_some_and(|max| nodes_explored >= max) {
                break;
            }
            if nodes_explored % DEADLINE_CHECK_INTERVAL == 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                hit_deadline = true;
                break;
            }
            let Some(node) = frontier.pop() else {
                break;
            };
            nodes_explored += 1;

            if node.bound >= best_length {
                nodes_pruned += 1;
                continue;
            }

            let last = node.path[node.path.len() - 1];

            if node.remaining.is_empty() {
                let total = node.cost + graph.distance(last, start);
                if total < best_length {
                    best_length = total;
                    first_incumbent_at.get_or_insert(nodes_explored);
                    log::debug!("new incumbent {:.6} after {} nodes", total, nodes_explored);
                    best_tour = Some(node.path);
                }
                continue;
            }

            for (k, &next) in node.remaining.iter().enumerate() {
                let mut path = Vec::with_capacity(node.path.len() + 1);
                path.extend_from_slice(&node.path);
                path.push(next);

                let mut remaining = Vec::with_capacity(node.remaining.len() - 1);
                remaining.extend_from_slice(&node.remaining[..k]);
                remaining.extend_from_slice(&node.remaining[k + 1..]);

                let cost = node.cost + graph.distance(last, next);
                let bound = lower_bound.estimate(graph, &path, &remaining, cost);

                if bound < best_length {
                    frontier.push(SearchNode {
                        path,
                        remaining,
                        cost,
                        bound,
                    });
                } else {
                    nodes_pruned += 1;
                }
            }
        }

        let Some(tour) = best_tour else {
            let reason = if hit_deadline { "deadline" } else { "node budget" };
            return Err(TspError::no_solution(format!(
                "{} exhausted after {} nodes without a complete tour",
                reason, nodes_explored
            )));
        };

        let exhausted = frontier.min_bound().map_or(true, |bound| bound >= best_length);
        let status = if exhausted {
            SearchStatus::Optimal
        } else if hit_deadline {
            SearchStatus::TimeLimit
        } else {
            SearchStatus::NodeLimit
        };

        let mut solution = Solution::from_tour(graph, tour, self.name());
        solution.ensure_complete(graph)?;
        solution.computation_time = started.elapsed().as_secs_f64();
        solution.iterations = Some(nodes_explored);

        let result = ExactResult {
            solution,
            status,
            nodes_explored,
            nodes_pruned,
            root_bound,
            first_incumbent_at,
        };

        if result.is_optimal() {
            log::info!(
                "{} ({} bound): optimum {:.6}, {} nodes explored, {} pruned ({:.1}%)",
                self.name(),
                lower_bound,
                result.solution.length,
                nodes_explored,
                nodes_pruned,
                result.pruning_efficiency()
            );
        } else {
            log::warn!(
                "{} stopped early ({}): best {:.6} after {} nodes, may not be optimal",
                self.name(),
                status,
                result.solution.length,
                nodes_explored
            );
        }

        Ok(result)
    }

    /// Run [`solve`](Self::solve) on a worker thread and give up after `timeout`.
    ///
    /// Returns `Ok(None)` when no result arrived within `timeout`. When no time
    /// limit is configured the worker gets `timeout` plus a short grace period as
    /// its own deadline: it stops soon after the caller gives up, but never
    /// reports `TimeLimit` or a deadline `NoSolution` in place of `Ok(None)`.
    /// A configured time limit is kept as is and may end the search first.
    pub fn solve_with_timeout(&self, graph: &Graph, timeout: Duration) -> Result<Option<ExactResult>> {
        let mut config = self.config.clone();
        if config.time_limit.is_none() {
            config.time_limit = Some(timeout.saturating_add(TIMEOUT_GRACE));
        }
        let graph = graph.clone();
        let (sender, receiver) = crossbeam_channel::bounded(1);

        std::thread::spawn(move || {
            let result = BranchAndBoundSolver::new(config).solve(&graph);
            // receiver is gone once the caller timed out
            let _ = sender.send(result);
        });

        match receiver.recv_timeout(timeout) {
            Ok(result) => result.map(Some),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("{} timed out after {:.1}s", self.name(), timeout.as_secs_f64());
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(TspError::invariant("solver thread exited without reporting a result"))
            }
        }
    }

    fn trivial(&self, graph: &Graph, tour: Vec<usize>, started: Instant) -> ExactResult {
        let mut solution = Solution::from_tour(graph, tour, self.name());
        solution.computation_time = started.elapsed().as_secs_f64();
        solution.iterations = Some(0);
        let root_bound = solution.length;

        ExactResult {
            solution,
            status: SearchStatus::Optimal,
            nodes_explored: 0,
            nodes_pruned: 0,
            root_bound,
            first_incumbent_at: None,
        }
    }
}

impl Default for BranchAndBoundSolver {
    fn default() -> Self {
        Self::new(BranchAndBoundConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::unit_square;
    use crate::graph::Point;
    use crate::heuristics::{ConstructionHeuristic, LocalSearch, MstApproxHeuristic, NearestNeighborHeuristic, TwoOptSearch};

    fn unbounded(lower_bound: LowerBound) -> BranchAndBoundSolver {
        BranchAndBoundSolver::new(BranchAndBoundConfig {
            lower_bound,
            max_nodes: None,
            ..Default::default()
        })
    }

    /// Length of the best tour by trying every permutation fixing vertex 0
    fn brute_force(graph: &Graph) -> f64 {
        fn recurse(graph: &Graph, path: &mut Vec<usize>, used: &mut [bool], best: &mut f64) {
            if path.len() == graph.n() {
                *best = best.min(graph.tour_length(path));
                return;
            }
            for v in 0..graph.n() {
                if !used[v] {
                    used[v] = true;
                    path.push(v);
                    recurse(graph, path, used, best);
                    path.pop();
                    used[v] = false;
                }
            }
        }

        let mut used = vec![false; graph.n()];
        used[0] = true;
        let mut best = f64::INFINITY;
        recurse(graph, &mut vec![0], &mut used, &mut best);
        best
    }

    #[test]
    fn test_unit_square_optimal() {
        let graph = unit_square();
        for bound in [LowerBound::HalfSum, LowerBound::Simple] {
            let result = BranchAndBoundSolver::with_bound(bound).solve(&graph).unwrap();
            assert!((result.solution.length - 4.0).abs() < 1e-12);
            assert!(result.is_optimal());
            assert_eq!(result.solution.tour[0], 0);
            assert!(result.root_bound <= 4.0 + 1e-12);
        }
    }

    #[test]
    fn test_matches_brute_force() {
        for seed in 0..4 {
            let graph = Graph::with_seed(7, seed);
            let expected = brute_force(&graph);
            let result = unbounded(LowerBound::HalfSum).solve(&graph).unwrap();
            assert!((result.solution.length - expected).abs() < 1e-9);
            assert!(graph.is_hamiltonian(&result.solution.tour));
        }
    }

    #[test]
    fn test_bounds_agree_on_optimum() {
        for seed in 10..13 {
            let graph = Graph::with_seed(8, seed);
            let half_sum = unbounded(LowerBound::HalfSum).solve(&graph).unwrap();
            let simple = unbounded(LowerBound::Simple).solve(&graph).unwrap();

            assert!(half_sum.is_optimal() && simple.is_optimal());
            assert!((half_sum.solution.length - simple.solution.length).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bounds_are_admissible_at_root() {
        let graph = Graph::with_seed(8, 3);
        let optimum = brute_force(&graph);
        let remaining: Vec<usize> = (1..8).collect();
        for bound in [LowerBound::HalfSum, LowerBound::Simple] {
            assert!(bound.estimate(&graph, &[0], &remaining, 0.0) <= optimum + 1e-9);
        }
    }

    #[test]
    fn test_not_worse_than_heuristics() {
        for seed in 0..3 {
            let graph = Graph::with_seed(9, seed);
            let exact = unbounded(LowerBound::HalfSum).solve(&graph).unwrap();

            let nn = NearestNeighborHeuristic::new(0).construct(&graph).unwrap();
            let mut two_opt = nn.clone();
            TwoOptSearch::new().improve(&graph, &mut two_opt).unwrap();
            let mst = MstApproxHeuristic::new(0).construct(&graph).unwrap();

            for heuristic in [&nn, &two_opt, &mst] {
                assert!(exact.solution.length <= heuristic.length + 1e-9);
            }
        }
    }

    #[test]
    fn test_degenerate_sizes() {
        let solver = BranchAndBoundSolver::default();

        let empty = Graph::with_seed(0, 0);
        let result = solver.solve(&empty).unwrap();
        assert!(result.solution.tour.is_empty());
        assert_eq!(result.solution.length, 0.0);

        let single = Graph::from_points(vec![Point::new(0.2, 0.4)]).unwrap();
        let result = solver.solve(&single).unwrap();
        assert_eq!(result.solution.tour, vec![0]);
        assert_eq!(result.solution.length, 0.0);

        let pair = Graph::from_points(vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0)]).unwrap();
        let result = BranchAndBoundSolver::new(BranchAndBoundConfig {
            start: 1,
            ..Default::default()
        })
        .solve(&pair)
        .unwrap();
        assert_eq!(result.solution.tour, vec![1, 0]);
        assert!((result.solution.length - 10.0).abs() < 1e-12);
        assert!(result.is_optimal());
    }

    #[test]
    fn test_start_out_of_range() {
        let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
            start: 4,
            ..Default::default()
        });
        let err = solver.solve(&unit_square()).unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));
    }

    #[test]
    fn test_budget_without_incumbent_is_error() {
        let graph = Graph::with_seed(8, 1);
        let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
            max_nodes: Some(1),
            ..Default::default()
        });
        assert!(matches!(solver.solve(&graph), Err(TspError::NoSolution(_))));
    }

    #[test]
    fn test_node_limit_keeps_incumbent() {
        let graph = Graph::with_seed(9, 6);
        let full = unbounded(LowerBound::HalfSum).solve(&graph).unwrap();
        let first = full.first_incumbent_at.unwrap();

        let limited = BranchAndBoundSolver::new(BranchAndBoundConfig {
            max_nodes: Some(first),
            ..Default::default()
        })
        .solve(&graph)
        .unwrap();

        assert_eq!(limited.nodes_explored, first);
        assert!(graph.is_hamiltonian(&limited.solution.tour));
        assert!(limited.solution.length >= full.solution.length - 1e-9);
        if limited.is_optimal() {
            assert!((limited.solution.length - full.solution.length).abs() < 1e-9);
        } else {
            assert_eq!(limited.status, SearchStatus::NodeLimit);
        }
    }

    #[test]
    fn test_zero_deadline_stops_immediately() {
        let graph = Graph::with_seed(8, 2);
        let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
            time_limit: Some(Duration::ZERO),
            ..Default::default()
        });
        assert!(matches!(solver.solve(&graph), Err(TspError::NoSolution(_))));
    }

    #[test]
    fn test_solve_with_timeout_returns_result() {
        let graph = Graph::with_seed(7, 5);
        let result = BranchAndBoundSolver::default()
            .solve_with_timeout(&graph, Duration::from_secs(60))
            .unwrap()
            .unwrap();
        assert!(result.is_optimal());
        assert!((result.solution.length - brute_force(&graph)).abs() < 1e-9);
    }

    #[test]
    fn test_solve_with_timeout_gives_up_first() {
        // far too large to prove within the timeout; the worker's own deadline is later
        let graph = Graph::with_seed(40, 11);
        let solver = BranchAndBoundSolver::new(BranchAndBoundConfig {
            max_nodes: None,
            ..Default::default()
        });

        for _ in 0..3 {
            let outcome = solver.solve_with_timeout(&graph, Duration::from_millis(5)).unwrap();
            assert!(outcome.is_none());
        }
    }

    #[test]
    fn test_statistics() {
        let graph = Graph::with_seed(8, 4);
        let result = BranchAndBoundSolver::default().solve(&graph).unwrap();
        assert!(result.nodes_explored > 0);
        assert_eq!(result.solution.iterations, Some(result.nodes_explored));
        assert!((0.0..=100.0).contains(&result.pruning_efficiency()));
        assert!(result.root_gap() >= -1e-12);
    }

    #[test]
    fn test_frontier_order() {
        let mut frontier = Frontier::default();
        let node = |depth: usize, bound: f64| SearchNode {
            path: (0..depth).collect(),
            remaining: Vec::new(),
            cost: 0.0,
            bound,
        };
        frontier.push(node(1, 3.0));
        frontier.push(node(2, 2.0));
        frontier.push(node(3, 2.0));
        frontier.push(node(1, 1.0));

        let order: Vec<(usize, f64)> = std::iter::from_fn(|| frontier.pop())
            .map(|n| (n.path.len(), n.bound))
            .collect();
        assert_eq!(order, vec![(1, 1.0), (3, 2.0), (2, 2.0), (1, 3.0)]);
    }
}
