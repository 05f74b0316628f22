use std::time::{Duration, Instant};

/// Fires at most once per `interval`, tracked relative to the last fire.
///
/// Used for the linger timer, the keepalive ping/pong cadence, and the
/// consumer auto-commit timer — anywhere spec.md describes a recurring
/// "every N has elapsed" check driven from a poll loop rather than a
/// dedicated sleeping task.
#[derive(Clone, Copy, Debug)]
pub struct Repeater {
    interval: Duration,
    last_acted: Instant,
    forced: bool,
}

impl Repeater {
    #[inline]
    pub fn every(interval: Duration) -> Self {
        Self { interval, last_acted: Instant::now(), forced: false }
    }

    /// Returns true and resets the internal clock iff `interval` has elapsed
    /// since the last fire (or construction), or [`force_fire`] was called.
    #[inline]
    pub fn fired(&mut self) -> bool {
        if std::mem::take(&mut self.forced) || self.last_acted.elapsed() >= self.interval {
            self.last_acted = Instant::now();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[inline]
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Restarts the interval from now without firing.
    pub fn reset(&mut self) {
        self.last_acted = Instant::now();
        self.forced = false;
    }

    /// Makes the next `fired()` call return true regardless of elapsed time.
    pub fn force_fire(&mut self) {
        self.forced = true;
    }

    pub fn elapsed(&self) -> Duration {
        self.last_acted.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_fire_before_interval() {
        let mut r = Repeater::every(Duration::from_millis(50));
        assert!(!r.fired());
    }

    #[test]
    fn fires_after_interval() {
        let mut r = Repeater::every(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(10));
        assert!(r.fired());
        assert!(!r.fired());
    }

    #[test]
    fn force_fire_is_one_shot() {
        let mut r = Repeater::every(Duration::from_secs(30));
        r.force_fire();
        assert!(r.fired());
        assert!(!r.fired());
    }
}
