//! Identity sources for newly instantiated entities.

use std::fmt;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slicework_foundation::EntityId;

/// Produces fresh entity ids.
///
/// Generators never return [`EntityId::null`].
pub trait IdGenerator: Send {
    /// Returns the next id.
    fn next_id(&mut self) -> EntityId;
}

/// Caller-supplied mapping from a base id to an instance id.
///
/// Used where ids must be reproducible outside this process (network
/// replication, for example). The generator is available for ids the mapper
/// does not want to choose itself.
pub type CustomIdMapper = Arc<dyn Fn(EntityId, &mut dyn IdGenerator) -> EntityId + Send + Sync>;

/// Random 64-bit ids from a `ChaCha8` stream.
pub struct RandomIdGenerator {
    rng: ChaCha8Rng,
}

impl RandomIdGenerator {
    /// Seeds from system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Seeds deterministically.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomIdGenerator").finish_non_exhaustive()
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&mut self) -> EntityId {
        loop {
            let raw: u64 = self.rng.r#gen();
            if raw != u64::MAX {
                return EntityId::new(raw);
            }
        }
    }
}

/// Monotonic ids starting from a fixed value.
#[derive(Debug, Clone)]
pub struct SequentialIdGenerator {
    next: u64,
}

impl SequentialIdGenerator {
    /// Starts counting at `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator for SequentialIdGenerator {
    /// # Panics
    ///
    /// Panics once the id space is exhausted.
    fn next_id(&mut self) -> EntityId {
        assert!(self.next != u64::MAX, "sequential id space exhausted");
        let id = EntityId::new(self.next);
        self.next += 1;
        id
    }
}
