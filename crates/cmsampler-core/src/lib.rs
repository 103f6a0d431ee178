#![deny(missing_docs)]
#![doc = "Shared identifiers, error type, and deterministic RNG handle for cmsampler crates."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod rng;

pub use errors::{CmError, ErrorInfo};
pub use rng::{derive_substream_seed, RngHandle};

/// Identifier for a node in a sampled graph.
///
/// Node identifiers are dense: a graph over `n` nodes uses exactly the
/// identifiers `0..n`. This matches the zero-based indexing used by the
/// adjacency and label bookkeeping structures in `cmsampler-graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as a `usize` suitable for array indexing.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Identifier for a node label (an entry in a joint label matrix's class
/// set). Labels are dense integers assigned in first-seen order while a
/// label file is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(u32);

impl LabelId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as a `usize` suitable for array indexing.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}
