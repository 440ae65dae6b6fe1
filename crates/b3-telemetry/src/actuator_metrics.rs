use b3_foundation::clock::Clock;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared, cross-thread counters for the actuator scheduler's diagnostic tick.
///
/// All fields are cheap to read from the pipeline thread without taking a
/// lock on the scheduler itself.
#[derive(Clone)]
pub struct ActuatorMetrics {
    pub pin_writes: Arc<AtomicU64>,
    pub queue_resets: Arc<AtomicU64>,
    pub under_runs: Arc<AtomicU64>,
    pub body_flips: Arc<AtomicU64>,
    last_debug_emit: Arc<RwLock<Option<Instant>>>,
}

impl Default for ActuatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorMetrics {
    pub fn new() -> Self {
        Self {
            pin_writes: Arc::new(AtomicU64::new(0)),
            queue_resets: Arc::new(AtomicU64::new(0)),
            under_runs: Arc::new(AtomicU64::new(0)),
            body_flips: Arc::new(AtomicU64::new(0)),
            last_debug_emit: Arc::new(RwLock::new(None)),
        }
    }

    pub fn record_pin_write(&self) {
        self.pin_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_reset(&self) {
        self.queue_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_under_run(&self) {
        self.under_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_body_flip(&self) {
        self.body_flips.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns `Some(writes_per_second)` and resets the write counter if at
    /// least `interval` has elapsed since the last emission; otherwise `None`.
    /// Takes `clock` rather than reading `Instant::now()` directly so this
    /// stays deterministic under a `TestClock` like the rest of the scheduler.
    pub fn maybe_emit(&self, clock: &dyn Clock, interval: Duration) -> Option<f64> {
        let now = clock.now();
        let mut guard = self.last_debug_emit.write();
        let elapsed = match *guard {
            Some(last) => now.duration_since(last),
            None => {
                *guard = Some(now);
                return None;
            }
        };
        if elapsed < interval {
            return None;
        }
        let writes = self.pin_writes.swap(0, Ordering::Relaxed);
        *guard = Some(now);
        Some(writes as f64 / elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b3_foundation::clock::test_clock;

    #[test]
    fn counters_start_at_zero() {
        let m = ActuatorMetrics::new();
        assert_eq!(m.pin_writes.load(Ordering::Relaxed), 0);
        assert_eq!(m.under_runs.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn record_pin_write_increments() {
        let m = ActuatorMetrics::new();
        m.record_pin_write();
        m.record_pin_write();
        assert_eq!(m.pin_writes.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn maybe_emit_first_call_primes_and_returns_none() {
        let m = ActuatorMetrics::new();
        let clock = test_clock();
        assert_eq!(m.maybe_emit(clock.as_ref(), Duration::from_secs(3)), None);
    }

    #[test]
    fn maybe_emit_before_interval_returns_none() {
        let m = ActuatorMetrics::new();
        let clock = test_clock();
        m.maybe_emit(clock.as_ref(), Duration::from_secs(3));
        m.record_pin_write();
        assert_eq!(m.maybe_emit(clock.as_ref(), Duration::from_secs(3)), None);
    }

    #[test]
    fn maybe_emit_after_interval_under_a_test_clock_reports_rate() {
        let m = ActuatorMetrics::new();
        let clock = test_clock();
        m.maybe_emit(clock.as_ref(), Duration::from_secs(3));
        m.record_pin_write();
        m.record_pin_write();
        clock.sleep(Duration::from_secs(4));
        let rate = m.maybe_emit(clock.as_ref(), Duration::from_secs(3));
        assert_eq!(rate, Some(0.5));
    }
}
