use cmsampler_core::derive_substream_seed;

/// Derives the deterministic seed used for a specific chain.
///
/// A single `RngHandle` per chain is seeded from this value; chains never
/// share or mutate each other's state, so identical `(master_seed,
/// chain_index)` pairs always reproduce identical chains regardless of how
/// many worker threads execute the run.
pub fn chain_seed(master_seed: u64, chain_index: usize) -> u64 {
    derive_substream_seed(master_seed, chain_index as u64)
}
