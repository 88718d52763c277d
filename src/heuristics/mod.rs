//! Heuristics module.
//!
//! This module exports the tour construction heuristics and the 2-opt improvement.

pub mod construction;
pub mod local_search;
pub mod mst;

pub use construction::*;
pub use local_search::*;
pub use mst::*;
