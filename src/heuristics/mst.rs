//! Minimum-spanning-tree approximation.
//!
//! Builds a minimum spanning tree with Prim's algorithm and walks it in preorder;
//! the first-visit order is the tour. With the triangle inequality the tour is at
//! most twice the tree weight, hence at most twice the optimum.

use crate::error::{Result, TspError};
use crate::graph::Graph;
use crate::heuristics::construction::ConstructionHeuristic;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Undirected tree over the vertices of a graph
#[derive(Debug, Clone, Serialize)]
pub struct SpanningTree {
    pub root: usize,
    adjacency: Vec<Vec<usize>>,
    edges: Vec<(usize, usize, f64)>,
}

impl SpanningTree {
    pub fn new(n: usize, root: usize) -> Self {
        SpanningTree {
            root,
            adjacency: vec![Vec::new(); n],
            edges: Vec::with_capacity(n.saturating_sub(1)),
        }
    }

    fn add_edge(&mut self, u: usize, v: usize, weight: f64) {
        self.adjacency[u].push(v);
        self.adjacency[v].push(u);
        self.edges.push((u, v, weight));
    }

    pub fn neighbors(&self, u: usize) -> &[usize] {
        &self.adjacency[u]
    }

    /// Edges `(tree vertex, new vertex, weight)` in insertion order
    pub fn edges(&self) -> &[(usize, usize, f64)] {
        &self.edges
    }

    /// Total weight of the tree
    pub fn weight(&self) -> f64 {
        self.edges.iter().map(|&(_, _, w)| w).sum()
    }

    /// Depth-first preorder from `root`, neighbours visited in adjacency order.
    ///
    /// Iterative so that path-like trees cannot overflow the call stack.
    pub fn preorder(&self, root: usize) -> Vec<usize> {
        let n = self.adjacency.len();
        if root >= n {
            return Vec::new();
        }

        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            order.push(node);

            // reversed so the first neighbour is popped first
            for &neighbor in self.adjacency[node].iter().rev() {
                if !visited[neighbor] {
                    stack.push(neighbor);
                }
            }
        }

        order
    }
}

/// Prim's algorithm with a binary heap of candidate edges
/// `(weight, tree vertex, outside vertex)`; stale entries are skipped on pop.
pub fn prim_mst(graph: &Graph, root: usize) -> SpanningTree {
    let n = graph.n();
    let mut tree = SpanningTree::new(n, root);
    if n == 0 {
        return tree;
    }

    let mut in_tree = vec![false; n];
    in_tree[root] = true;
    let mut included = 1;

    let mut heap = BinaryHeap::new();
    for v in (0..n).filter(|&v| v != root) {
        heap.push(Reverse((OrderedFloat(graph.distance(root, v)), root, v)));
    }

    while included < n {
        let Some(Reverse((OrderedFloat(weight), u, v))) = heap.pop() else {
            break;
        };
        if in_tree[v] {
            continue;
        }

        tree.add_edge(u, v, weight);
        in_tree[v] = true;
        included += 1;

        for w in (0..n).filter(|&w| !in_tree[w]) {
            heap.push(Reverse((OrderedFloat(graph.distance(v, w)), v, w)));
        }
    }

    tree
}

/// Details of one MST approximation run
#[derive(Debug, Clone, Serialize)]
pub struct MstReport {
    pub tree: SpanningTree,
    pub solution: Solution,
    pub mst_weight: f64,
    /// Tour length divided by tree weight; at most 2 for Euclidean instances
    pub approximation_ratio: f64,
}

/// Tour from the preorder walk of a minimum spanning tree
pub struct MstApproxHeuristic {
    pub start: usize,
}

impl MstApproxHeuristic {
    pub fn new(start: usize) -> Self {
        MstApproxHeuristic { start }
    }

    /// Build the tree and the tour, keeping both for inspection.
    pub fn analyze(&self, graph: &Graph) -> Result<MstReport> {
        let start = std::time::Instant::now();
        let n = graph.n();

        if n == 0 {
            return Ok(MstReport {
                tree: SpanningTree::new(0, 0),
                solution: Solution::from_tour(graph, Vec::new(), self.name()),
                mst_weight: 0.0,
                approximation_ratio: f64::INFINITY,
            });
        }
        graph.check_vertex(self.start)?;

        let tree = prim_mst(graph, self.start);
        let tour = tree.preorder(self.start);
        if tour.len() != n {
            return Err(TspError::invariant(format!(
                "preorder walk visited {} of {} vertices",
                tour.len(),
                n
            )));
        }

        let mut solution = Solution::from_tour(graph, tour, self.name());
        solution.ensure_complete(graph)?;
        solution.computation_time = start.elapsed().as_secs_f64();

        let mst_weight = tree.weight();
        let approximation_ratio = if mst_weight > 0.0 {
            solution.length / mst_weight
        } else {
            f64::INFINITY
        };
        log::debug!(
            "{}: mst weight {:.6}, tour {:.6}, ratio {:.3}",
            self.name(),
            mst_weight,
            solution.length,
            approximation_ratio
        );

        Ok(MstReport {
            tree,
            solution,
            mst_weight,
            approximation_ratio,
        })
    }
}

impl Default for MstApproxHeuristic {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConstructionHeuristic for MstApproxHeuristic {
    fn construct(&self, graph: &Graph) -> Result<Solution> {
        self.analyze(graph).map(|report| report.solution)
    }

    fn name(&self) -> &str {
        "MstApprox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::unit_square;
    use crate::graph::Point;

    #[test]
    fn test_prim_square() {
        let graph = unit_square();
        let tree = prim_mst(&graph, 0);

        assert_eq!(tree.edges().len(), 3);
        assert!((tree.weight() - 3.0).abs() < 1e-12);
        assert_eq!(tree.neighbors(0), &[1, 3]);
    }

    #[test]
    fn test_prim_weight_independent_of_root() {
        let graph = Graph::with_seed(30, 17);
        let reference = prim_mst(&graph, 0).weight();
        for root in [5, 12, 29] {
            assert!((prim_mst(&graph, root).weight() - reference).abs() < 1e-9);
        }
    }

    #[test]
    fn test_preorder_order() {
        let mut tree = SpanningTree::new(5, 0);
        tree.add_edge(0, 1, 1.0);
        tree.add_edge(0, 2, 1.0);
        tree.add_edge(1, 3, 1.0);
        tree.add_edge(2, 4, 1.0);

        assert_eq!(tree.preorder(0), vec![0, 1, 3, 2, 4]);
        assert_eq!(tree.preorder(4), vec![4, 2, 0, 1, 3]);
    }

    #[test]
    fn test_preorder_deep_path() {
        let n = 200_000;
        let mut tree = SpanningTree::new(n, 0);
        for v in 1..n {
            tree.add_edge(v - 1, v, 1.0);
        }
        let order = tree.preorder(0);
        assert_eq!(order.len(), n);
        assert_eq!(order[n - 1], n - 1);
    }

    #[test]
    fn test_mst_tour_within_twice_tree_weight() {
        for seed in 0..5 {
            let graph = Graph::with_seed(40, seed);
            let report = MstApproxHeuristic::new(0).analyze(&graph).unwrap();

            assert!(graph.is_hamiltonian(&report.solution.tour));
            assert_eq!(report.solution.tour[0], 0);
            assert!(report.solution.length <= 2.0 * report.mst_weight + 1e-9);
            assert!(report.approximation_ratio >= 1.0 - 1e-9);
        }
    }

    #[test]
    fn test_mst_degenerate_sizes() {
        let empty = Graph::with_seed(0, 0);
        let solution = MstApproxHeuristic::default().construct(&empty).unwrap();
        assert!(solution.tour.is_empty());

        let single = Graph::from_points(vec![Point::new(1.0, 1.0)]).unwrap();
        let solution = MstApproxHeuristic::default().construct(&single).unwrap();
        assert_eq!(solution.tour, vec![0]);
        assert_eq!(solution.length, 0.0);

        let pair = Graph::from_points(vec![Point::new(0.0, 0.0), Point::new(1.5, 2.0)]).unwrap();
        let solution = MstApproxHeuristic::new(1).construct(&pair).unwrap();
        assert_eq!(solution.tour, vec![1, 0]);
        assert!((solution.length - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_mst_start_out_of_range() {
        let graph = unit_square();
        let err = MstApproxHeuristic::new(9).construct(&graph).unwrap_err();
        assert!(matches!(err, TspError::InvalidInput(_)));
    }
}
