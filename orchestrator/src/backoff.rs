//! Retry pacing for transient infrastructure failures.

use rand::{Rng, RngCore};
use std::time::Duration;

/// "Equal jitter": delay is in [backoff/2, backoff].
pub(crate) fn jittered_backoff(rng: &mut impl RngCore, backoff: Duration) -> Duration {
    let backoff_ms = backoff.as_millis() as u64;
    if backoff_ms <= 1 {
        return backoff;
    }
    let half_ms = backoff_ms / 2;
    let jitter_ms = rng.gen_range(0..=half_ms);
    Duration::from_millis(half_ms.saturating_add(jitter_ms))
}

/// Bounded exponential backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Policy for transient infrastructure errors: persistence conflicts,
    /// signing-service hiccups, chain adapter timeouts.
    pub fn transient() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(30),
            max_attempts: 4,
        }
    }

    /// Raw (pre-jitter) delay before retry `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)));
        exp.min(self.cap)
    }

    /// Jittered delay before retry `attempt`.
    pub fn jittered_delay(&self, attempt: u32, rng: &mut impl RngCore) -> Duration {
        jittered_backoff(rng, self.delay(attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn delays_double_then_cap() {
        let policy = RetryPolicy::transient();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(10), Duration::from_secs(30)); // capped
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_in_equal_jitter_band() {
        let mut rng = StdRng::seed_from_u64(0);
        let backoff = Duration::from_secs(10);
        for _ in 0..1_000 {
            let jittered = jittered_backoff(&mut rng, backoff);
            assert!(jittered >= backoff / 2);
            assert!(jittered <= backoff);
        }
    }

    #[test]
    fn tiny_backoff_passes_through() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            jittered_backoff(&mut rng, Duration::from_millis(1)),
            Duration::from_millis(1)
        );
    }
}
