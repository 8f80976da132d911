use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Source of candidate UID values.
///
/// The registry draws from it until it gets a value that is non-zero and not
/// already in use, so a source may return collisions freely.
pub trait UidSource: Send {
    fn next_uid(&mut self) -> u64;
}

impl<F: FnMut() -> u64 + Send> UidSource for F {
    fn next_uid(&mut self) -> u64 {
        self()
    }
}

/// Uniformly random UIDs.
pub struct RandomUidSource {
    rng: StdRng,
}

impl RandomUidSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for reproducible tests and benchmarks.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomUidSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl UidSource for RandomUidSource {
    fn next_uid(&mut self) -> u64 {
        self.rng.next_u64()
    }
}
