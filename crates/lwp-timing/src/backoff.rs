use std::time::Duration;

use rand::Rng;

const BASE: Duration = Duration::from_millis(100);
const CAP: Duration = Duration::from_secs(30);
const JITTER_FRAC: f64 = 0.20;

/// Exponential backoff with `±20%` jitter, capped at 30s: `min(30s, 100ms * 2^n)`.
///
/// `n` resets whenever the connection reaches `Ready` (see
/// `lwp_transport::ConnectionState`).
#[derive(Clone, Copy, Debug, Default)]
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub const fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Returns the delay to wait before the next reconnect attempt, then
    /// advances the internal attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(20); // 2^20 * 100ms already far past the cap
        self.attempt = self.attempt.saturating_add(1);
        let nominal = BASE.saturating_mul(1u32 << exp).min(CAP);
        jittered(nominal)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

fn jittered(nominal: Duration) -> Duration {
    let delta = nominal.mul_f64(JITTER_FRAC);
    let low = nominal.saturating_sub(delta);
    let high = nominal.saturating_add(delta);
    if low >= high {
        return nominal;
    }
    rand::rng().random_range(low..=high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_caps() {
        let mut b = Backoff::new();
        let mut prev = Duration::ZERO;
        for _ in 0..10 {
            let d = b.next_delay();
            assert!(d <= CAP.mul_f64(1.0 + JITTER_FRAC));
            prev = d;
        }
        let _ = prev;
        // after many attempts, delay should hover at the cap
        for _ in 0..50 {
            b.next_delay();
        }
        let d = b.next_delay();
        assert!(d >= CAP.mul_f64(1.0 - JITTER_FRAC));
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut b = Backoff::new();
        for _ in 0..10 {
            b.next_delay();
        }
        b.reset();
        let d = b.next_delay();
        assert!(d <= BASE.mul_f64(1.0 + JITTER_FRAC));
    }
}
