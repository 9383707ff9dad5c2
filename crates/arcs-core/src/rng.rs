//! Deterministic RNG wrapper and seed-derivation helpers.

use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use siphasher::sip::SipHasher13;

use crate::types::StudentId;

/// Deterministic RNG handle injected into every stochastic component.
///
/// The handle is a thin wrapper around `StdRng`. Substreams are derived by
/// hashing `(master_seed, substream_id)` with SipHash-1-3 keyed with zeros, so
/// the derivation is stable across platforms.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns a mutable reference to the underlying RNG for advanced usage.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform integer in `[0, upper)`. `upper` must be positive.
    pub fn index(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..upper)
    }

    /// Uniform float in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// Derives the default invocation seed from the student identifiers in the
/// order they were loaded.
pub fn seed_from_students<'a, I>(ids: I) -> u64
where
    I: IntoIterator<Item = &'a StudentId>,
{
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    for id in ids {
        hasher.write(id.as_str().as_bytes());
        hasher.write_u8(0xff);
    }
    hasher.finish()
}
