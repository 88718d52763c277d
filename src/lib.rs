//! Euclidean TSP Solver Library
//!
//! Heuristic and exact solvers for the travelling salesman problem on points in
//! the plane.
//!
//! # Features
//!
//! - Nearest-point insertion construction (cheapest or after-nearest insertion)
//! - 2-opt local search, first or best improvement
//! - Minimum-spanning-tree 2-approximation (Prim + preorder walk)
//! - Exact best-first branch and bound with half-sum or simple lower bounds
//! - Multi-trial experiments, statistics, CSV export and SVG visualization
//!
//! # Example
//!
//! ```
//! use tsp_solver::exact::BranchAndBoundSolver;
//! use tsp_solver::graph::Graph;
//! use tsp_solver::heuristics::{ConstructionHeuristic, LocalSearch, NearestNeighborHeuristic, TwoOptSearch};
//!
//! // Eight random points in the unit square
//! let graph = Graph::with_seed(8, 42);
//!
//! // Construct, then improve with 2-opt
//! let mut solution = NearestNeighborHeuristic::new(0).construct(&graph)?;
//! TwoOptSearch::new().improve(&graph, &mut solution)?;
//!
//! // Prove the optimum
//! let exact = BranchAndBoundSolver::default().solve(&graph)?;
//! assert!(exact.solution.length <= solution.length + 1e-9);
//!
//! println!("2-opt: {:.4}, optimum: {:.4}", solution.length, exact.solution.length);
//! # Ok::<(), tsp_solver::TspError>(())
//! ```

pub mod benchmark;
pub mod error;
pub mod exact;
pub mod graph;
pub mod heuristics;
pub mod solution;
pub mod visualization;

pub use error::{Result, TspError};
pub use graph::{Graph, Point};
pub use solution::Solution;
