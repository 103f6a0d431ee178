#![deny(missing_docs)]

//! Degree-sequence graph state and joint label matrix bookkeeping used by the
//! double-edge-swap samplers in `cmsampler-mcmc`.

mod graph_state;
mod label_index;

pub use graph_state::{GraphState, SwapDelta, SwapPairing, SwapPlan};
pub use label_index::{JlmDelta, LabelIndex, LabelRecord};
