use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use b3_dsp::{FilteredFrame, FrameConsumer};
use b3_foundation::clock::SharedClock;
use b3_telemetry::ActuatorMetrics;

use crate::gpio::{ActuatorError, Gpio, MockGpio, Pin, BODY_DUTY, MOUTH_DUTY};

/// How often the scheduler emits a writes-per-second diagnostic line.
pub const DEBUG_INTERVAL: Duration = Duration::from_secs(3);

/// Thresholds and timing knobs the scheduler re-reads every tick. Owned by
/// the caller's config layer; the scheduler only ever loads these values.
pub struct SharedThresholds {
    body_threshold_bits: AtomicU32,
    mouth_threshold_bits: AtomicU32,
    rms_window_ms: AtomicU32,
    flip_interval_ms: AtomicU64,
}

impl SharedThresholds {
    pub fn new(
        body_threshold: f32,
        mouth_threshold: f32,
        rms_window_ms: u32,
        flip_interval_ms: u64,
    ) -> Self {
        Self {
            body_threshold_bits: AtomicU32::new(body_threshold.to_bits()),
            mouth_threshold_bits: AtomicU32::new(mouth_threshold.to_bits()),
            rms_window_ms: AtomicU32::new(rms_window_ms),
            flip_interval_ms: AtomicU64::new(flip_interval_ms),
        }
    }

    pub fn body_threshold(&self) -> f32 {
        f32::from_bits(self.body_threshold_bits.load(Ordering::Relaxed))
    }

    pub fn set_body_threshold(&self, value: f32) {
        self.body_threshold_bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn mouth_threshold(&self) -> f32 {
        f32::from_bits(self.mouth_threshold_bits.load(Ordering::Relaxed))
    }

    pub fn set_mouth_threshold(&self, value: f32) {
        self.mouth_threshold_bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn rms_window_ms(&self) -> u32 {
        self.rms_window_ms.load(Ordering::Relaxed)
    }

    pub fn set_rms_window_ms(&self, value: u32) {
        self.rms_window_ms.store(value, Ordering::Relaxed);
    }

    pub fn flip_interval_ms(&self) -> u64 {
        self.flip_interval_ms.load(Ordering::Relaxed)
    }

    pub fn set_flip_interval_ms(&self, value: u64) {
        self.flip_interval_ms.store(value, Ordering::Relaxed);
    }
}

/// Root-mean-square over `[window_start, cursor)`, drawing samples with a
/// negative index from the tail of `previous` and clamping the upper bound
/// to what `current` actually holds.
fn windowed_rms(current: &[i16], previous: Option<&[i16]>, window_start: i64, cursor: i64) -> f32 {
    let mut sum_sq: f64 = 0.0;
    let mut count: u64 = 0;

    if window_start < 0 {
        if let Some(prev) = previous {
            let prev_len = prev.len() as i64;
            let start_in_prev = (prev_len + window_start).max(0);
            for i in start_in_prev..prev_len {
                let s = prev[i as usize] as f64;
                sum_sq += s * s;
                count += 1;
            }
        }
    }

    let start_cur = window_start.max(0);
    let end_cur = cursor.min(current.len() as i64);
    if end_cur > start_cur {
        for i in start_cur..end_cur {
            let s = current[i as usize] as f64;
            sum_sq += s * s;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt() as f32
}

struct BodyFlipState {
    flip: bool,
    last_flip_us: u64,
    consecutive_low: u64,
}

impl BodyFlipState {
    fn new() -> Self {
        Self {
            flip: false,
            last_flip_us: 0,
            consecutive_low: 0,
        }
    }
}

fn write_pins(
    gpio: &mut dyn Gpio,
    rms_lpf: f32,
    rms_hpf: f32,
    now_us: u64,
    sample_rate: u32,
    thresholds: &SharedThresholds,
    body: &mut BodyFlipState,
    metrics: &ActuatorMetrics,
) {
    let move_body = rms_lpf > thresholds.body_threshold();
    let move_mouth = rms_hpf > thresholds.mouth_threshold();

    if move_body {
        body.consecutive_low = 0;
        let (dir_a, dir_b) = if body.flip { (true, false) } else { (false, true) };
        gpio.write(Pin::BodyDirA, dir_a);
        gpio.write(Pin::BodyDirB, dir_b);
        gpio.pwm(Pin::BodySpeed, BODY_DUTY);
    } else {
        gpio.pwm(Pin::BodySpeed, 0);
        body.consecutive_low += 1;
        if body.consecutive_low > (sample_rate as u64 / 80) {
            let flip_interval_us = thresholds.flip_interval_ms() * 1_000;
            if now_us.saturating_sub(body.last_flip_us) > flip_interval_us {
                body.flip = !body.flip;
                body.last_flip_us = now_us;
                metrics.record_body_flip();
            }
        }
    }

    if move_mouth {
        gpio.write(Pin::MouthDirA, false);
        gpio.write(Pin::MouthDirB, true);
        gpio.pwm(Pin::MouthSpeed, MOUTH_DUTY);
    } else {
        gpio.pwm(Pin::MouthSpeed, 0);
    }

    metrics.record_pin_write();
}

/// Drives pins from one frame until the wall-clock cursor runs off its end.
/// Returns once the frame is exhausted or a shutdown is requested.
fn process_frame(
    frame: &FilteredFrame,
    previous: Option<&FilteredFrame>,
    frame_start: Instant,
    clock: &dyn b3_foundation::clock::Clock,
    sample_rate: u32,
    thresholds: &SharedThresholds,
    body: &mut BodyFlipState,
    gpio: &mut dyn Gpio,
    metrics: &ActuatorMetrics,
    should_exit: &AtomicBool,
) {
    loop {
        if should_exit.load(Ordering::Relaxed) {
            return;
        }

        let elapsed_us = clock.now().duration_since(frame_start).as_micros() as i64;
        let cursor = elapsed_us * sample_rate as i64 / 1_000_000;
        if cursor < 0 {
            continue;
        }
        if cursor as usize >= frame.len() {
            return;
        }

        let window_samples = (thresholds.rms_window_ms() as i64) * sample_rate as i64 / 1_000;
        let window_start = cursor - window_samples;

        let rms_lpf = windowed_rms(
            &frame.lpf,
            previous.map(|p| p.lpf.as_slice()),
            window_start,
            cursor,
        );
        let rms_hpf = windowed_rms(
            &frame.hpf,
            previous.map(|p| p.hpf.as_slice()),
            window_start,
            cursor,
        );

        write_pins(
            gpio,
            rms_lpf,
            rms_hpf,
            elapsed_us as u64,
            sample_rate,
            thresholds,
            body,
            metrics,
        );
    }
}

/// Owns the actuator thread: pops filtered frames and drives GPIO pins in
/// step with wall-clock playback time.
pub struct ActuatorScheduler {
    should_exit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ActuatorScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        mut gpio: Box<dyn Gpio>,
        sample_rate: u32,
        thresholds: Arc<SharedThresholds>,
        mut consumer: FrameConsumer,
        clock: SharedClock,
        metrics: ActuatorMetrics,
    ) -> Self {
        let should_exit = Arc::new(AtomicBool::new(false));
        let thread_exit = should_exit.clone();

        let handle = thread::Builder::new()
            .name("b3-actuator".to_string())
            .spawn(move || {
                if let Err(e) = gpio.init() {
                    tracing::error!("gpio init failed, running in mock mode: {e}");
                    gpio = Box::new(MockGpio::new());
                }
                for pin in Pin::ALL {
                    gpio.set_mode_output(pin);
                }

                let mut previous: Option<FilteredFrame> = None;
                let mut body = BodyFlipState::new();
                let mut frame_start = clock.now();
                let mut in_reset_burst = false;

                while !thread_exit.load(Ordering::Relaxed) {
                    match consumer.try_pop() {
                        None => {
                            frame_start = clock.now();
                            metrics.record_queue_reset();
                            metrics.record_under_run();
                            if !in_reset_burst {
                                tracing::warn!("actuator frame queue empty, resetting playback timing");
                                in_reset_burst = true;
                            }
                            clock.sleep(Duration::from_millis(1));
                        }
                        Some(frame) => {
                            in_reset_burst = false;
                            let frame_len = frame.len();
                            process_frame(
                                &frame,
                                previous.as_ref(),
                                frame_start,
                                clock.as_ref(),
                                sample_rate,
                                &thresholds,
                                &mut body,
                                gpio.as_mut(),
                                &metrics,
                                &thread_exit,
                            );
                            let frame_duration_us =
                                frame_len as u64 * 1_000_000 / sample_rate.max(1) as u64;
                            frame_start += Duration::from_micros(frame_duration_us);
                            previous = Some(frame);
                        }
                    }

                    if let Some(rate) = metrics.maybe_emit(clock.as_ref(), DEBUG_INTERVAL) {
                        tracing::debug!(
                            writes_per_sec = rate,
                            body_threshold = thresholds.body_threshold(),
                            mouth_threshold = thresholds.mouth_threshold(),
                            "actuator diagnostics"
                        );
                    }
                }

                gpio.flush_all_low();
                gpio.terminate();
            })
            .expect("failed to spawn actuator scheduler thread");

        Self {
            should_exit,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.should_exit.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ActuatorScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

pub type GpioInitError = ActuatorError;
