//! Simulation environment.
//!
//! Time comes from the tokio clock, so tests running on a paused runtime
//! (`#[tokio::test(start_paused = true)]`) see stagger sleeps complete
//! instantly in virtual time. Randomness comes from a seeded ChaCha stream,
//! so sender ids, subscription ids, stagger delays and variable payload
//! lengths replay exactly for a given seed.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stompload_core::Environment;

/// Default seed for [`SimEnv::new`].
pub const DEFAULT_SEED: u64 = 0x5354_4f4d_504c_4f41;

/// Deterministic environment on the tokio clock.
///
/// Clones share one RNG stream.
#[derive(Clone, Debug)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment seeded with [`DEFAULT_SEED`].
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::expect_used)]
        self.rng.lock().expect("SimEnv RNG mutex poisoned").fill_bytes(buffer);
    }
}
