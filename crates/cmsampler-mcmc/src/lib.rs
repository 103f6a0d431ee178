#![deny(missing_docs)]

//! Metropolis-Hastings double-edge-swap samplers (CM/LA/LW), per-chain
//! telemetry, deterministic seeding, and the parallel multi-chain driver.

mod assortativity;
mod chain;
/// YAML configuration schema and defaults.
pub mod config;
mod determinism;
mod driver;
mod kernel;

pub use assortativity::AssortativityTracker;
pub use chain::{run_chain, ChainOutcome, ChainStats, ChainTelemetry, ProbBuckets, TerminationMode};
pub use config::{Algorithm, OutputConfig, RunConfig};
pub use determinism::chain_seed;
pub use driver::{run_chains, ChainJob};
pub use kernel::{cm_acceptance_prob, step, SamplerVariant, StepOutcome};
