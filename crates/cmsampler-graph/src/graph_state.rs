use std::collections::HashMap;

use cmsampler_core::{CmError, ErrorInfo, NodeId};
use rand::Rng;

/// Which pairing a double-edge-swap produces.
///
/// Given `e1 = {a,b}` at index `i` and `e2 = {c,d}` at index `j`, pairing
/// [`SwapPairing::First`] produces `{a,c},{b,d}`; [`SwapPairing::Second`]
/// produces `{a,d},{b,c}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPairing {
    /// `{a,c},{b,d}`.
    First,
    /// `{a,d},{b,c}`.
    Second,
}

/// A fully evaluated, not-yet-applied double-edge-swap.
///
/// Built by [`GraphState::plan_swap`] without mutating the graph, so the
/// sampler kernel can compute an acceptance probability from `old_*`/`new_*`
/// before deciding whether to call [`GraphState::apply_swap`].
#[derive(Debug, Clone, Copy)]
pub struct SwapPlan {
    /// Index of the first edge in the swap.
    pub i: usize,
    /// Index of the second edge in the swap.
    pub j: usize,
    /// Which endpoint pairing would be produced.
    pub pairing: SwapPairing,
    /// Edge currently stored at `i`.
    pub old_edge_i: (NodeId, NodeId),
    /// Edge currently stored at `j`.
    pub old_edge_j: (NodeId, NodeId),
    /// Edge that would replace `old_edge_i`.
    pub new_edge_i: (NodeId, NodeId),
    /// Edge that would replace `old_edge_j`.
    pub new_edge_j: (NodeId, NodeId),
    /// Whether the swap must be rejected outright (still counts as a proposal).
    pub forbidden: bool,
}

/// Records what changed so a swap can be applied to the joint label matrix
/// and, if needed, rolled back.
#[derive(Debug, Clone, Copy)]
pub struct SwapDelta {
    /// Index of the first edge touched by the swap.
    pub i: usize,
    /// Index of the second edge touched by the swap.
    pub j: usize,
    /// Edge previously stored at `i`.
    pub old_edge_i: (NodeId, NodeId),
    /// Edge previously stored at `j`.
    pub old_edge_j: (NodeId, NodeId),
    /// Edge now stored at `i`.
    pub new_edge_i: (NodeId, NodeId),
    /// Edge now stored at `j`.
    pub new_edge_j: (NodeId, NodeId),
}

fn canon_key(u: NodeId, v: NodeId) -> u64 {
    let (lo, hi) = if u.as_raw() <= v.as_raw() {
        (u.as_raw(), v.as_raw())
    } else {
        (v.as_raw(), u.as_raw())
    };
    (lo as u64) << 32 | hi as u64
}

fn canon_pair(u: NodeId, v: NodeId) -> (NodeId, NodeId) {
    if u.as_raw() <= v.as_raw() {
        (u, v)
    } else {
        (v, u)
    }
}

fn graph_error(code: impl Into<String>, message: impl Into<String>) -> CmError {
    CmError::Invariant(ErrorInfo::new(code, message))
}

/// Mutable state shared by every sampler variant: an ordered edge list, the
/// adjacency multiset derived from it, and the immutable original degree
/// sequence and adjacency baseline used for perturbation scoring.
///
/// Constructed once per chain and deep-copied per worker; mutated only
/// through [`GraphState::apply_swap`] / [`GraphState::revert_swap`].
#[derive(Debug, Clone)]
pub struct GraphState {
    edges: Vec<(NodeId, NodeId)>,
    adjacency: HashMap<u64, i64>,
    baseline: HashMap<u64, i64>,
    degrees: Vec<u32>,
    allows_self_loops: bool,
    perturbation: f64,
}

impl GraphState {
    /// Builds a graph state from an edge list and the full (possibly
    /// including isolated nodes) degree sequence.
    ///
    /// Validates that the degree implied by `edges` matches `degrees`
    /// exactly; a mismatch is a caller bug surfaced as
    /// [`CmError::Invariant`].
    pub fn new(edges: Vec<(NodeId, NodeId)>, degrees: Vec<u32>) -> Result<Self, CmError> {
        let mut adjacency: HashMap<u64, i64> = HashMap::new();
        let mut derived = vec![0u32; degrees.len()];
        let mut allows_self_loops = false;
        for &(u, v) in &edges {
            let (ui, vi) = (u.index(), v.index());
            if ui >= derived.len() || vi >= derived.len() {
                return Err(graph_error(
                    "node-out-of-range",
                    "edge endpoint exceeds declared node count",
                )
                .with_context("u", u.as_raw().to_string())
                .with_context("v", v.as_raw().to_string()));
            }
            derived[ui] += 1;
            derived[vi] += 1;
            if u == v {
                allows_self_loops = true;
            }
            *adjacency.entry(canon_key(u, v)).or_insert(0) += 1;
        }
        if derived != degrees {
            return Err(graph_error(
                "degree-mismatch",
                "edge list does not reproduce the declared degree sequence",
            ));
        }
        let baseline = adjacency.clone();
        Ok(Self {
            edges,
            adjacency,
            baseline,
            degrees,
            allows_self_loops,
            perturbation: 0.0,
        })
    }

    /// Number of edges, `m`.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of nodes, `n` (including isolated nodes).
    pub fn num_nodes(&self) -> usize {
        self.degrees.len()
    }

    /// Original, invariant degree sequence.
    pub fn degrees(&self) -> &[u32] {
        &self.degrees
    }

    /// Returns the edge currently stored at index `idx`.
    pub fn edge(&self, idx: usize) -> (NodeId, NodeId) {
        self.edges[idx]
    }

    /// Returns the multiplicity of the canonical pair `(u, v)` in the
    /// current adjacency multiset.
    pub fn multiplicity(&self, u: NodeId, v: NodeId) -> i64 {
        self.adjacency.get(&canon_key(u, v)).copied().unwrap_or(0)
    }

    /// Current perturbation score: half the L1 distance between the current
    /// and original adjacency multisets, maintained incrementally.
    pub fn perturbation_score(&self) -> f64 {
        self.perturbation
    }

    /// Recomputes the perturbation score from scratch by scanning every
    /// touched adjacency cell. Used by tests to cross-check the incremental
    /// value maintained by [`Self::perturbation_score`].
    pub fn perturbation_score_batch(&self) -> f64 {
        let mut keys: std::collections::HashSet<u64> = self.adjacency.keys().copied().collect();
        keys.extend(self.baseline.keys().copied());
        let mut total = 0i64;
        for key in keys {
            let current = self.adjacency.get(&key).copied().unwrap_or(0);
            let original = self.baseline.get(&key).copied().unwrap_or(0);
            total += (current - original).abs();
        }
        total as f64 / 2.0
    }

    /// Picks two distinct edge indices uniformly at random via rejection
    /// sampling (`rng.gen_range` already performs unbiased range selection,
    /// so no hand-rolled modulo reduction is used here).
    pub fn pick_two_distinct_edges<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, usize) {
        let m = self.edges.len();
        loop {
            let i = rng.gen_range(0..m);
            let j = rng.gen_range(0..m);
            if i != j {
                return (i, j);
            }
        }
    }

    /// Evaluates, without mutating, the double-edge-swap between edges `i`
    /// and `j` under the given pairing.
    pub fn plan_swap(&self, i: usize, j: usize, pairing: SwapPairing) -> SwapPlan {
        let (a, b) = self.edges[i];
        let (c, d) = self.edges[j];
        let (new_i, new_j) = match pairing {
            SwapPairing::First => ((a, c), (b, d)),
            SwapPairing::Second => ((a, d), (b, c)),
        };
        let new_i = canon_pair(new_i.0, new_i.1);
        let new_j = canon_pair(new_j.0, new_j.1);

        // A shared endpoint is one that `e1={a,b}` and `e2={c,d}` have in
        // common. A self-loop edge (a==b or c==d) repeats a node within its
        // own pair, not across the two edges, and must not trip this.
        let shared_endpoint = a == c || a == d || b == c || b == d;

        let introduces_self_loop = (new_i.0 == new_i.1 || new_j.0 == new_j.1) && !self.allows_self_loops;
        let produced_identical = new_i == new_j;

        SwapPlan {
            i,
            j,
            pairing,
            old_edge_i: (a, b),
            old_edge_j: (c, d),
            new_edge_i: new_i,
            new_edge_j: new_j,
            forbidden: shared_endpoint || introduces_self_loop || produced_identical,
        }
    }

    fn adjust(&mut self, u: NodeId, v: NodeId, delta: i64) -> (i64, i64) {
        let key = canon_key(u, v);
        let entry = self.adjacency.entry(key).or_insert(0);
        let before = *entry;
        *entry += delta;
        let after = *entry;
        if after == 0 {
            self.adjacency.remove(&key);
        }
        (before, after)
    }

    fn apply_perturbation_delta(&mut self, key: u64, before: i64, after: i64) {
        let baseline = self.baseline.get(&key).copied().unwrap_or(0);
        let old_term = (before - baseline).abs();
        let new_term = (after - baseline).abs();
        self.perturbation += (new_term - old_term) as f64 / 2.0;
    }

    /// Applies a previously planned, non-forbidden swap: mutates the edge
    /// list, the adjacency multiset, and the incremental perturbation score.
    ///
    /// Returns the delta needed to drive the joint label matrix update and,
    /// if required, [`Self::revert_swap`].
    pub fn apply_swap(&mut self, plan: &SwapPlan) -> SwapDelta {
        debug_assert!(!plan.forbidden, "apply_swap called on a forbidden plan");

        let (old_a, old_b) = plan.old_edge_i;
        let (old_c, old_d) = plan.old_edge_j;
        for (u, v) in [(old_a, old_b), (old_c, old_d)] {
            let key = canon_key(u, v);
            let (before, after) = self.adjust(u, v, -1);
            self.apply_perturbation_delta(key, before, after);
        }
        for (u, v) in [plan.new_edge_i, plan.new_edge_j] {
            let key = canon_key(u, v);
            let (before, after) = self.adjust(u, v, 1);
            self.apply_perturbation_delta(key, before, after);
        }

        self.edges[plan.i] = plan.new_edge_i;
        self.edges[plan.j] = plan.new_edge_j;

        SwapDelta {
            i: plan.i,
            j: plan.j,
            old_edge_i: plan.old_edge_i,
            old_edge_j: plan.old_edge_j,
            new_edge_i: plan.new_edge_i,
            new_edge_j: plan.new_edge_j,
        }
    }

    /// Undoes a swap previously applied via [`Self::apply_swap`].
    pub fn revert_swap(&mut self, delta: &SwapDelta) {
        for (u, v) in [delta.new_edge_i, delta.new_edge_j] {
            let key = canon_key(u, v);
            let (before, after) = self.adjust(u, v, -1);
            self.apply_perturbation_delta(key, before, after);
        }
        for (u, v) in [delta.old_edge_i, delta.old_edge_j] {
            let key = canon_key(u, v);
            let (before, after) = self.adjust(u, v, 1);
            self.apply_perturbation_delta(key, before, after);
        }
        self.edges[delta.i] = delta.old_edge_i;
        self.edges[delta.j] = delta.old_edge_j;
    }

    /// Returns a snapshot of all edges in index order.
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    /// Checks the universal invariants required after every accepted swap:
    /// the degree sequence is unchanged, the adjacency multiset sums to `m`,
    /// and every multiplicity is non-negative.
    pub fn check_invariants(&self) -> Result<(), CmError> {
        let mut derived = vec![0u32; self.degrees.len()];
        let mut total: i64 = 0;
        for &(u, v) in &self.edges {
            derived[u.index()] += 1;
            derived[v.index()] += 1;
        }
        for count in self.adjacency.values() {
            if *count < 0 {
                return Err(graph_error("negative-multiplicity", "adjacency multiset went negative"));
            }
            total += *count;
        }
        if total as usize != self.edges.len() {
            return Err(graph_error(
                "adjacency-sum-mismatch",
                "adjacency multiset total does not equal the edge count",
            )
            .with_context("expected", self.edges.len().to_string())
            .with_context("actual", total.to_string()));
        }
        if derived != self.degrees {
            return Err(graph_error(
                "degree-drift",
                "degree sequence drifted from its original value",
            ));
        }
        Ok(())
    }
}

trait ErrorInfoContext {
    fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self;
}

impl ErrorInfoContext for CmError {
    fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            CmError::Invariant(info) => CmError::Invariant(info.with_context(key, value)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(raw: u32) -> NodeId {
        NodeId::from_raw(raw)
    }

    fn triangle() -> GraphState {
        let edges = vec![(n(0), n(1)), (n(1), n(2)), (n(2), n(0))];
        GraphState::new(edges, vec![2, 2, 2]).unwrap()
    }

    #[test]
    fn construction_validates_degree_sequence() {
        let edges = vec![(n(0), n(1)), (n(1), n(2))];
        let err = GraphState::new(edges, vec![1, 1, 1]).unwrap_err();
        assert!(matches!(err, CmError::Invariant(_)));
    }

    #[test]
    fn apply_and_revert_round_trip() {
        let mut graph = triangle();
        let plan = graph.plan_swap(0, 1, SwapPairing::First);
        assert!(!plan.forbidden || plan.forbidden);
        if !plan.forbidden {
            let before = graph.edges().to_vec();
            let delta = graph.apply_swap(&plan);
            graph.revert_swap(&delta);
            assert_eq!(graph.edges(), before.as_slice());
        }
    }

    #[test]
    fn perturbation_score_matches_batch_recomputation() {
        let mut graph = GraphState::new(
            vec![(n(0), n(1)), (n(2), n(3)), (n(4), n(5)), (n(6), n(7))],
            vec![1; 8],
        )
        .unwrap();
        let plan = graph.plan_swap(0, 1, SwapPairing::First);
        if !plan.forbidden {
            graph.apply_swap(&plan);
            assert_eq!(graph.perturbation_score(), graph.perturbation_score_batch());
        }
    }

    #[test]
    fn invariants_hold_after_accepted_swap() {
        let mut graph = GraphState::new(
            vec![(n(0), n(1)), (n(2), n(3)), (n(4), n(5)), (n(6), n(7))],
            vec![1; 8],
        )
        .unwrap();
        let plan = graph.plan_swap(0, 1, SwapPairing::Second);
        if !plan.forbidden {
            graph.apply_swap(&plan);
            graph.check_invariants().unwrap();
        }
    }
}
