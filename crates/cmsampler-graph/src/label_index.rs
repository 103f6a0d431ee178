use cmsampler_core::{CmError, ErrorInfo, LabelId, NodeId};

/// A single parsed line of a labels file: the node's label plus the optional
/// free-form `inner_or_outer` metadata column the original label files carry
/// but never validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    /// Label assigned to the node.
    pub label: LabelId,
    /// Optional third-column metadata, stored but otherwise unused.
    pub inner_or_outer: Option<String>,
}

fn canon_label_pair(a: LabelId, b: LabelId) -> (LabelId, LabelId) {
    if a.as_raw() <= b.as_raw() {
        (a, b)
    } else {
        (b, a)
    }
}

/// The per-cell changes a swap would make to the joint label matrix.
///
/// A swap touches at most four cells (two decremented for the removed
/// edges, two incremented for the produced edges); cells that coincide are
/// merged so `apply`/`revert` never double-count.
#[derive(Debug, Clone, Default)]
pub struct JlmDelta {
    cells: Vec<((LabelId, LabelId), i64)>,
}

impl JlmDelta {
    fn add(&mut self, pair: (LabelId, LabelId), amount: i64) {
        for (existing, count) in &mut self.cells {
            if *existing == pair {
                *count += amount;
                return;
            }
        }
        self.cells.push((pair, amount));
    }

    /// Returns `true` if this swap leaves the joint label matrix exactly
    /// unchanged, i.e. every touched cell nets to zero.
    pub fn is_identity(&self) -> bool {
        self.cells.iter().all(|(_, count)| *count == 0)
    }
}

/// Dense node-label assignment and the joint label matrix (JLM) it induces
/// over the current edge set.
///
/// Constructed once per chain and deep-copied per worker, mutated only
/// through [`LabelIndex::apply`] / [`LabelIndex::revert`].
#[derive(Debug, Clone)]
pub struct LabelIndex {
    records: Vec<LabelRecord>,
    num_labels: usize,
    jlm: Vec<i64>,
}

impl LabelIndex {
    /// Builds a label index from one record per node (in node-id order) and
    /// the graph's current edge list, from which the initial JLM is derived.
    pub fn new(records: Vec<LabelRecord>, edges: &[(NodeId, NodeId)]) -> Result<Self, CmError> {
        let num_labels = records
            .iter()
            .map(|record| record.label.as_raw() as usize + 1)
            .max()
            .unwrap_or(0);
        let mut jlm = vec![0i64; num_labels * num_labels];
        let mut index = Self {
            records,
            num_labels,
            jlm: Vec::new(),
        };
        for &(u, v) in edges {
            let la = index.label_of(u)?;
            let lb = index.label_of(v)?;
            let (a, b) = canon_label_pair(la, lb);
            jlm[a.index() * num_labels + b.index()] += 1;
            if a != b {
                jlm[b.index() * num_labels + a.index()] += 1;
            }
        }
        index.jlm = jlm;
        Ok(index)
    }

    fn label_of(&self, node: NodeId) -> Result<LabelId, CmError> {
        self.records
            .get(node.index())
            .map(|record| record.label)
            .ok_or_else(|| {
                CmError::Input(
                    ErrorInfo::new("missing-label", "node has no label assigned")
                        .with_context("node", node.as_raw().to_string()),
                )
            })
    }

    /// Returns the label assigned to `node`.
    pub fn label(&self, node: NodeId) -> LabelId {
        self.records[node.index()].label
    }

    /// Returns the number of distinct labels, `L`.
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Returns the current joint label matrix cell `JLM[a][b]`.
    pub fn jlm(&self, a: LabelId, b: LabelId) -> i64 {
        self.jlm[a.index() * self.num_labels + b.index()]
    }

    /// Returns the full joint label matrix, row-major, `L*L` entries.
    pub fn jlm_matrix(&self) -> &[i64] {
        &self.jlm
    }

    /// Computes the cell-level change a swap would make without mutating
    /// this index.
    pub fn delta_on_swap(
        &self,
        old_edge_i: (NodeId, NodeId),
        old_edge_j: (NodeId, NodeId),
        new_edge_i: (NodeId, NodeId),
        new_edge_j: (NodeId, NodeId),
    ) -> JlmDelta {
        let mut delta = JlmDelta::default();
        for (u, v) in [old_edge_i, old_edge_j] {
            let pair = canon_label_pair(self.label(u), self.label(v));
            delta.add(pair, -1);
        }
        for (u, v) in [new_edge_i, new_edge_j] {
            let pair = canon_label_pair(self.label(u), self.label(v));
            delta.add(pair, 1);
        }
        delta
    }

    fn mutate(&mut self, delta: &JlmDelta, sign: i64) {
        for ((a, b), count) in &delta.cells {
            let amount = sign * count;
            self.jlm[a.index() * self.num_labels + b.index()] += amount;
            if a != b {
                self.jlm[b.index() * self.num_labels + a.index()] += amount;
            }
        }
    }

    /// Applies a delta computed by [`Self::delta_on_swap`].
    pub fn apply(&mut self, delta: &JlmDelta) {
        self.mutate(delta, 1);
    }

    /// Undoes a delta previously applied via [`Self::apply`].
    pub fn revert(&mut self, delta: &JlmDelta) {
        self.mutate(delta, -1);
    }

    /// Recomputes the joint label matrix from scratch over the given edge
    /// list. Used by tests and invariant checks to cross-validate the
    /// incrementally maintained matrix.
    pub fn recompute(&self, edges: &[(NodeId, NodeId)]) -> Vec<i64> {
        let mut jlm = vec![0i64; self.num_labels * self.num_labels];
        for &(u, v) in edges {
            let (a, b) = canon_label_pair(self.label(u), self.label(v));
            jlm[a.index() * self.num_labels + b.index()] += 1;
            if a != b {
                jlm[b.index() * self.num_labels + a.index()] += 1;
            }
        }
        jlm
    }
}
