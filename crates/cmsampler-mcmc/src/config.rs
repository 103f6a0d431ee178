use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Sampler variant selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Configuration Model: uniform double-edge-swap, no label gate.
    Cm,
    /// Label-Aware: rejects any swap that would change the joint label matrix.
    La,
    /// Label-Weighted: reweights acceptance toward a target label-mixing distribution.
    Lw,
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "cm" => Ok(Algorithm::Cm),
            "la" => Ok(Algorithm::La),
            "lw" => Ok(Algorithm::Lw),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Algorithm::Cm => "cm",
            Algorithm::La => "la",
            Algorithm::Lw => "lw",
        };
        write!(f, "{name}")
    }
}

/// YAML-configurable parameters governing a sampling run, layered under CLI
/// flag overrides (CLI always wins when both are given).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Sampler variant.
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    /// Number of independent chains, `D`.
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    /// Swap budget per chain; `-1` means `floor(m * ln(m))`.
    #[serde(default = "default_num_swaps")]
    pub num_swaps: i64,
    /// Convergence-run multiplier: `num_swaps = floor(mul_fact * m)`.
    #[serde(default = "default_mul_fact")]
    pub mul_fact: f64,
    /// Telemetry snapshot interval as a fraction of `m`.
    #[serde(default = "default_perc")]
    pub perc: f64,
    /// Maximum number of OS threads used by the parallel driver.
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Whether the swap budget counts accepted swaps rather than proposals.
    #[serde(default)]
    pub actual_swaps: bool,
    /// Master seed; chain seeds are derived deterministically from it.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Output path configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_algorithm() -> Algorithm {
    Algorithm::Cm
}

fn default_num_samples() -> usize {
    1
}

fn default_num_swaps() -> i64 {
    -1
}

fn default_mul_fact() -> f64 {
    10.0
}

fn default_perc() -> f64 {
    0.05
}

fn default_num_workers() -> usize {
    4
}

fn default_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            num_samples: default_num_samples(),
            num_swaps: default_num_swaps(),
            mul_fact: default_mul_fact(),
            perc: default_perc(),
            num_workers: default_num_workers(),
            actual_swaps: false,
            seed: default_seed(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Resolves the effective swap budget for a chain given the edge count
    /// `m`: the literal `num_swaps` unless it is the `-1` sentinel, in which
    /// case `floor(m * ln(m))`.
    pub fn resolve_swaps_budget(&self, num_edges: usize) -> usize {
        if self.num_swaps >= 0 {
            self.num_swaps as usize
        } else {
            let m = num_edges as f64;
            (m * m.ln()).floor().max(0.0) as usize
        }
    }

    /// Resolves the convergence-run swap budget: `floor(mul_fact * m)`.
    pub fn resolve_convergence_swaps(&self, num_edges: usize) -> usize {
        (self.mul_fact * num_edges as f64).floor().max(0.0) as usize
    }

    /// Resolves the telemetry snapshot interval: `max(floor(m * perc), 1)`.
    pub fn resolve_snapshot_interval(&self, num_edges: usize) -> usize {
        ((num_edges as f64 * self.perc).floor() as usize).max(1)
    }
}

/// Output directory and file layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root path artefacts are written under (`<base>/out/`).
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    /// Directory containing the input graph and label TSVs.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            data_dir: None,
        }
    }
}
