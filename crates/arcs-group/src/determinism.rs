use arcs_core::derive_substream_seed;

/// Seed for the random part of the initial population.
pub fn population_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0x5EED_5EED_5EED_5EED, 0)
}

/// Seed for the shuffled variants of the heuristic seeds.
pub fn seed_variant_seed(master_seed: u64, variant: usize) -> u64 {
    derive_substream_seed(master_seed ^ 0x5EED_5EED_5EED_5EED, 1 + variant as u64)
}

/// Seed for the offspring of one generation.
pub fn generation_seed(master_seed: u64, generation: usize) -> u64 {
    derive_substream_seed(master_seed, generation as u64)
}
