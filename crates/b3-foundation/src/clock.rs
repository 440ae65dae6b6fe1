//! Clock abstraction for deterministic scheduling tests.
//!
//! `Clock` can be backed by real wall-clock time or by a virtual clock driven
//! by the test itself, so the scheduling logic in `b3-actuator` and
//! `b3-app`'s pipeline can be exercised without real sleeps.

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub struct RealClock;

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RealClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct TestClock {
    current_time: Mutex<Instant>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            current_time: Mutex::new(Instant::now()),
        }
    }

    pub fn new_with_start_time(start_time: Instant) -> Self {
        Self {
            current_time: Mutex::new(start_time),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut time = self.current_time.lock().unwrap();
        *time += duration;
    }

    pub fn set_time(&self, time: Instant) {
        *self.current_time.lock().unwrap() = time;
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.current_time.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

pub type SharedClock = std::sync::Arc<dyn Clock + Send + Sync>;

pub fn real_clock() -> SharedClock {
    std::sync::Arc::new(RealClock::new())
}

pub fn test_clock() -> SharedClock {
    std::sync::Arc::new(TestClock::new())
}

pub fn test_clock_with_start(start_time: Instant) -> SharedClock {
    std::sync::Arc::new(TestClock::new_with_start_time(start_time))
}

/// Tracks elapsed time between successive `lap()` calls, advancing its own
/// reference point each time rather than measuring from a fixed start.
pub struct LapTimer {
    clock: SharedClock,
    start: Mutex<Instant>,
    last_lap_us: Mutex<u64>,
}

impl LapTimer {
    pub fn new(clock: SharedClock) -> Self {
        let now = clock.now();
        Self {
            clock,
            start: Mutex::new(now),
            last_lap_us: Mutex::new(0),
        }
    }

    /// Reset the reference point to now.
    pub fn start(&self) {
        *self.start.lock().unwrap() = self.clock.now();
        *self.last_lap_us.lock().unwrap() = 0;
    }

    /// Microseconds elapsed since the reference point, without advancing it.
    pub fn elapsed_us(&self) -> u64 {
        self.clock
            .now()
            .duration_since(*self.start.lock().unwrap())
            .as_micros() as u64
    }

    /// Microseconds elapsed since the last `lap()` (or `start()`), then
    /// advances the reference point by that amount.
    pub fn lap(&self) -> u64 {
        let mut start = self.start.lock().unwrap();
        let now = self.clock.now();
        let delta = now.duration_since(*start).as_micros() as u64;
        *start += Duration::from_micros(delta);
        *self.last_lap_us.lock().unwrap() = delta;
        delta
    }

    pub fn last_lap_us(&self) -> u64 {
        *self.last_lap_us.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advance_accumulates() {
        let clock = TestClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(100));
        clock.advance(Duration::from_millis(200));
        assert_eq!(clock.now().duration_since(start), Duration::from_millis(300));
    }

    #[test]
    fn lap_timer_reports_delta_and_advances_reference() {
        let clock = test_clock();
        let timer = LapTimer::new(clock.clone());
        clock.sleep(Duration::from_millis(50));
        let first = timer.lap();
        assert_eq!(first, 50_000);
        clock.sleep(Duration::from_millis(10));
        let second = timer.lap();
        assert_eq!(second, 10_000);
        assert_eq!(timer.last_lap_us(), 10_000);
    }

    #[test]
    fn lap_timer_elapsed_does_not_advance_reference() {
        let clock = test_clock();
        let timer = LapTimer::new(clock.clone());
        clock.sleep(Duration::from_millis(30));
        assert_eq!(timer.elapsed_us(), 30_000);
        assert_eq!(timer.elapsed_us(), 30_000);
    }
}
