//! Wall-clock environment for real runs.
//!
//! Stagger pauses are real tokio sleeps and sender/subscription ids come from
//! OS entropy, so two runs never share ids or pacing. Use a seeded
//! environment when a run has to be replayed.

use std::time::Duration;

use crate::env::Environment;

/// Wall clock, tokio timers and OS entropy.
#[derive(Clone, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Wall-clock environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    /// # Panics
    ///
    /// Panics when the OS cannot supply entropy. Ids drawn from a failed
    /// source would collide across workers.
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS entropy is available");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_uuid_shaped_and_distinct() {
        let env = SystemEnv::new();
        let ids: Vec<String> = (0..64).map(|_| env.unique_id()).collect();

        for id in &ids {
            let groups: Vec<usize> = id.split('-').map(str::len).collect();
            assert_eq!(groups, vec![8, 4, 4, 4, 12]);
            assert!(id.chars().all(|c| c == '-' || c.is_ascii_hexdigit()));
        }
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn random_below_stays_in_range() {
        let env = SystemEnv::new();
        for bound in [1u64, 2, 7, 1_000, u64::MAX] {
            assert!(env.random_below(bound) < bound);
        }
        assert_eq!(env.random_below(0), 0);
    }

    #[test]
    fn stagger_draws_vary_between_calls() {
        let env = SystemEnv::new();
        let draws: Vec<u64> = (0..16).map(|_| env.random_below(1_000_000_000)).collect();
        assert!(draws.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn stagger_pause_uses_tokio_timer() {
        let env = SystemEnv::new();
        let start = tokio::time::Instant::now();

        env.sleep(Duration::from_millis(250)).await;

        assert!(tokio::time::Instant::now() - start >= Duration::from_millis(250));
    }
}
