//! Local time sources
//!
//! All local times in the player are signed microseconds on one monotonic
//! timeline chosen by the clock source.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Monotonic local clock in microseconds
pub trait LocalClock: Send + Sync {
    /// Current local time
    fn now_us(&self) -> i64;

    /// Tokio instant at which the local clock reads `at_us`
    fn instant_at(&self, at_us: i64) -> Instant {
        let delta = at_us.saturating_sub(self.now_us()).max(0) as u64;
        offset_instant(Instant::now(), delta)
    }
}

/// `base + delta_us`, capped at roughly thirty years out
fn offset_instant(base: Instant, delta_us: u64) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);
    base.checked_add(Duration::from_micros(delta_us).min(FAR_FUTURE))
        .unwrap_or(base)
}

/// Clock backed by the tokio timer, so paused-time tests advance it
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalClock for MonotonicClock {
    fn now_us(&self) -> i64 {
        self.origin.elapsed().as_micros() as i64
    }

    fn instant_at(&self, at_us: i64) -> Instant {
        offset_instant(self.origin, at_us.max(0) as u64)
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_us: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_us)),
        }
    }

    pub fn set(&self, now_us: i64) {
        self.now.store(now_us, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_us: i64) {
        self.now.fetch_add(delta_us, Ordering::SeqCst);
    }
}

impl LocalClock for ManualClock {
    fn now_us(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(100);
        let other = clock.clone();
        clock.advance(50);
        assert_eq!(other.now_us(), 150);
        other.set(10);
        assert_eq!(clock.now_us(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_follows_tokio_time() {
        let clock = MonotonicClock::new();
        let before = clock.now_us();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(clock.now_us() - before, 250_000);
        assert_eq!(clock.instant_at(1_000), clock.origin + Duration::from_millis(1));
    }
}
