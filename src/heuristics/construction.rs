use crate::error::Result;
use crate::graph::Graph;
use crate::solution::Solution;

pub trait ConstructionHeuristic {
    fn construct(&self, graph: &Graph) -> Result<Solution>;
    fn name(&self) -> &str;
}

/// Where the chosen vertex goes once it has been selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPolicy {
    /// Cheapest of all cyclic insertion positions
    Cheapest,
    /// Directly after the tour vertex it is nearest to
    AfterNearest,
}

/// Nearest-point insertion heuristic
///
/// Starts from a one-vertex tour and repeatedly picks the unvisited vertex
/// closest to any vertex already in the tour, then inserts it according to the
/// configured [`InsertionPolicy`]. Fully deterministic for a given start vertex.
pub struct NearestNeighborHeuristic {
    pub start: usize,
    pub policy: InsertionPolicy,
}

impl NearestNeighborHeuristic {
    pub fn new(start: usize) -> Self {
        NearestNeighborHeuristic {
            start,
            policy: InsertionPolicy::Cheapest,
        }
    }

    /// Faster variant that skips the insertion-position search
    pub fn simple(start: usize) -> Self {
        NearestNeighborHeuristic {
            start,
            policy: InsertionPolicy::AfterNearest,
        }
    }

    /// Closest (unvisited, in-tour) pair; returns the vertex and the position of
    /// its nearest tour vertex. Unvisited vertices are scanned by ascending index
    /// and the first strict minimum wins.
    fn find_nearest(&self, graph: &Graph, tour: &[usize], in_tour: &[bool]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        let mut min_distance = f64::INFINITY;

        for v in (0..graph.n()).filter(|&v| !in_tour[v]) {
            for (pos, &t) in tour.iter().enumerate() {
                let d = graph.distance(v, t);
                if d < min_distance {
                    min_distance = d;
                    best = Some((v, pos));
                }
            }
        }

        best
    }

    /// Cost of inserting `vertex` at index `pos`, between `tour[pos - 1]` and
    /// `tour[pos]` read cyclically
    fn insertion_cost(&self, graph: &Graph, tour: &[usize], vertex: usize, pos: usize) -> f64 {
        let len = tour.len();
        let prev = tour[(pos + len - 1) % len];
        let next = tour[pos % len];

        graph.distance(prev, vertex) + graph.distance(vertex, next) - graph.distance(prev, next)
    }

    /// Index at which `vertex` should be inserted into `tour`.
    ///
    /// Index 0 and index `len` both stand for the closing edge; the scan starts
    /// at 0 and keeps the first strict minimum, so a tie on the closing edge
    /// puts the vertex at the front.
    fn best_insertion(&self, graph: &Graph, tour: &[usize], vertex: usize) -> usize {
        let mut best_pos = 0;
        let mut best_cost = f64::INFINITY;

        for pos in 0..=tour.len() {
            let cost = self.insertion_cost(graph, tour, vertex, pos);
            if cost < best_cost {
                best_cost = cost;
                best_pos = pos;
            }
        }

        best_pos
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, graph: &Graph) -> Result<Solution> {
        let start = std::time::Instant::now();

        if graph.is_empty() {
            return Ok(Solution::from_tour(graph, Vec::new(), self.name()));
        }
        graph.check_vertex(self.start)?;

        let n = graph.n();
        let mut tour = Vec::with_capacity(n);
        let mut in_tour = vec![false; n];
        tour.push(self.start);
        in_tour[self.start] = true;

        while tour.len() < n {
            let Some((vertex, anchor)) = self.find_nearest(graph, &tour, &in_tour) else {
                break;
            };

            let insert_at = match self.policy {
                InsertionPolicy::Cheapest => self.best_insertion(graph, &tour, vertex),
                InsertionPolicy::AfterNearest => anchor + 1,
            };
            tour.insert(insert_at, vertex);
            in_tour[vertex] = true;
        }

        let mut solution = Solution::from_tour(graph, tour, self.name());
        solution.ensure_complete(graph)?;
        solution.computation_time = start.elapsed().as_secs_f64();
        log::debug!("{}: length {:.6} from start {}", self.name(), solution.length, self.start);
        Ok(solution)
    }

    fn name(&self) -> &str {
        match self.policy {
            InsertionPolicy::Cheapest => "NearestNeighbor",
            InsertionPolicy::AfterNearest => "NearestNeighbor-Simple",
        }
    }
}
