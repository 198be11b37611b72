//! Time source used by the age-based cache policies.
//!
//! Pending timeouts, skipped-sequence expiry, and channel pruning all
//! compare entry ages against configured bounds. Routing those reads
//! through a trait lets tests pin time to a virtual value and step it
//! explicitly instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point in time, stored as whole milliseconds since the Unix epoch
/// (or since simulation start, under a virtual clock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// How old this stamp is as seen from `now`. A stamp that lies in the
    /// future has age zero rather than wrapping.
    pub fn age(self, now: Timestamp) -> Duration {
        Duration::from_millis(now.0.saturating_sub(self.0))
    }
}

/// Something that can report the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Timestamp(since_epoch.as_millis() as u64)
    }
}

/// Virtual clock for tests. Stands still until `advance` or `set` is
/// called; clones observe the same time.
#[derive(Clone, Default)]
pub struct SimulatedClock {
    millis: Arc<AtomicU64>,
}

impl SimulatedClock {
    pub fn new(start_millis: u64) -> Self {
        SimulatedClock {
            millis: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::Relaxed);
    }

    /// Jump the clock to an absolute time
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::Relaxed);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_measures_distance_to_now() {
        let stamp = Timestamp::from_millis(400);
        assert_eq!(stamp.age(Timestamp::from_millis(1000)), Duration::from_millis(600));
        assert_eq!(stamp.age(stamp), Duration::ZERO);
    }

    #[test]
    fn test_future_stamp_has_zero_age() {
        let stamp = Timestamp::from_millis(5000);
        assert_eq!(stamp.age(Timestamp::from_millis(1000)), Duration::ZERO);
    }

    #[test]
    fn test_system_clock_runs_forward() {
        let clock = SystemClock::new();
        let before = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now() > before);
    }

    #[test]
    fn test_simulated_clock_only_moves_when_told() {
        let clock = SimulatedClock::new(250);
        assert_eq!(clock.now(), clock.now());

        clock.advance(Duration::from_millis(750));
        assert_eq!(clock.now().as_millis(), 1000);

        clock.set(10);
        assert_eq!(clock.now().as_millis(), 10);
    }

    #[test]
    fn test_clones_observe_the_same_virtual_time() {
        let clock = SimulatedClock::new(0);
        let observer = clock.clone();
        clock.advance(Duration::from_millis(42));
        assert_eq!(observer.now().as_millis(), 42);
    }
}
