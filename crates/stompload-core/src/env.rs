//! Clock and entropy seam for workers.
//!
//! Producers and consumers never touch the clock or an RNG directly. Stagger
//! pauses, run timing and sender/subscription ids all go through an
//! [`Environment`], which lets a scenario replay the same pacing from a seed.

use std::time::Duration;

/// Where workers get the time, their pauses and their random draws.
///
/// `now()` is monotonic. Clones must share one source so that ids drawn by
/// different workers stay distinct.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Point in time; differences give run and connection durations.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current instant.
    fn now(&self) -> Self::Instant;

    /// Stagger pause between two messages. The only suspension point the
    /// harness adds on its own.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` from this environment's entropy.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`, big-endian from [`Self::random_bytes`].
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Random `u128` backing sender and subscription ids.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// Uniform draw in `[0, bound)`. Returns 0 when `bound` is 0.
    ///
    /// Uses rejection sampling so every value in range is equally likely.
    fn random_below(&self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let value = self.random_u64();
            if value < zone {
                return value % bound;
            }
        }
    }

    /// Fresh identifier in UUID text layout (8-4-4-4-12 hex digits).
    fn unique_id(&self) -> String {
        let v = self.random_u128();
        format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}
