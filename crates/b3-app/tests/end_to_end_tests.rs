use std::sync::Arc;
use std::time::Duration;

use b3_actuator::gpio::Pin;
use b3_actuator::{ActuatorScheduler, MockGpio, SharedThresholds};
use b3_app::config::Config;
use b3_app::decoder::MockDecoder;
use b3_app::pipeline::AudioPipeline;
use b3_app::sound_device::MockSoundDevice;
use b3_dsp::frame_queue;
use b3_foundation::clock::test_clock;
use b3_foundation::state::RunState;
use b3_telemetry::ActuatorMetrics;

/// Runs a pipeline to completion against a mock decoder/device, then lets a
/// real actuator scheduler drain the queued frames against a `TestClock`, and
/// returns the mock GPIO it drove.
fn run_to_completion(decoder: MockDecoder, sample_rate: u32, thresholds: SharedThresholds) -> MockGpio {
    let clock = test_clock();
    let (producer, consumer) = frame_queue(64);
    let mut pipeline = AudioPipeline::new(MockSoundDevice::new(), producer, clock.clone());
    pipeline.load_file(decoder);

    let mut config = Config {
        chunk_size_ms: 50,
        buffer_chunks: 1,
        ..Config::default()
    };
    config.body_threshold = thresholds.body_threshold();
    config.mouth_threshold = thresholds.mouth_threshold();

    let thresholds = Arc::new(thresholds);
    let gpio_handle = Arc::new(std::sync::Mutex::new(MockGpio::new()));
    let shared = SharedGpio(gpio_handle.clone());

    let mut scheduler = ActuatorScheduler::start(
        Box::new(shared),
        sample_rate,
        thresholds,
        consumer,
        clock.clone(),
        ActuatorMetrics::new(),
    );

    while !pipeline.is_stopped() {
        pipeline.tick(RunState::Playing, &config).unwrap();
    }
    clock.sleep(Duration::from_millis(200));
    std::thread::sleep(Duration::from_millis(30));
    scheduler.stop();

    Arc::try_unwrap(gpio_handle).unwrap().into_inner().unwrap()
}

#[derive(Clone)]
struct SharedGpio(Arc<std::sync::Mutex<MockGpio>>);

impl b3_actuator::Gpio for SharedGpio {
    fn init(&mut self) -> Result<(), b3_actuator::gpio::ActuatorError> {
        Ok(())
    }
    fn set_mode_output(&mut self, pin: Pin) {
        self.0.lock().unwrap().set_mode_output(pin);
    }
    fn write(&mut self, pin: Pin, high: bool) {
        self.0.lock().unwrap().write(pin, high);
    }
    fn pwm(&mut self, pin: Pin, duty: u8) {
        self.0.lock().unwrap().pwm(pin, duty);
    }
    fn flush_all_low(&mut self) {
        self.0.lock().unwrap().flush_all_low();
    }
    fn terminate(&mut self) {
        self.0.lock().unwrap().terminate();
    }
}

#[test]
fn silent_file_never_drives_either_actuator() {
    let decoder = MockDecoder::silence(44_100, 1, 44_100 * 2);
    let thresholds = SharedThresholds::new(3_000.0, 3_000.0, 20, 500);
    let gpio = run_to_completion(decoder, 44_100, thresholds);
    assert_eq!(*gpio.duty.get(&Pin::BodySpeed).unwrap_or(&0), 0);
    assert_eq!(*gpio.duty.get(&Pin::MouthSpeed).unwrap_or(&0), 0);
}

#[test]
fn loud_low_frequency_tone_drives_the_body_actuator() {
    // 100Hz sine sits inside the LPF passband and outside the HPF passband.
    let decoder = MockDecoder::sine(44_100, 1, 100.0, 44_100, i16::MAX / 2);
    let thresholds = SharedThresholds::new(500.0, 500.0, 20, 200);
    let gpio = run_to_completion(decoder, 44_100, thresholds);
    assert!(gpio.write_count > 0);
    assert_eq!(*gpio.duty.get(&Pin::BodySpeed).unwrap_or(&0), b3_actuator::BODY_DUTY);
}

#[test]
fn loud_high_frequency_tone_drives_the_mouth_actuator() {
    // 8kHz sine sits inside the HPF passband and outside the LPF passband.
    let decoder = MockDecoder::sine(44_100, 1, 8_000.0, 44_100, i16::MAX / 2);
    let thresholds = SharedThresholds::new(500.0, 500.0, 20, 200);
    let gpio = run_to_completion(decoder, 44_100, thresholds);
    assert_eq!(*gpio.duty.get(&Pin::MouthSpeed).unwrap_or(&0), b3_actuator::MOUTH_DUTY);
}

/// A live edit to `body_threshold` in the config file takes effect within a
/// single poll, exactly as the main loop applies it every tick.
#[test]
fn live_config_change_to_body_threshold_takes_effect_within_one_tick() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "body_threshold = 3000\n").unwrap();

    let mut config = Config::default();
    config.poll(file.path());
    let thresholds = SharedThresholds::new(config.body_threshold, config.mouth_threshold, 20, 500);
    assert_eq!(thresholds.body_threshold(), 3_000.0);

    std::fs::write(file.path(), "body_threshold = 10\n").unwrap();
    config.poll(file.path());
    thresholds.set_body_threshold(config.body_threshold);

    assert_eq!(thresholds.body_threshold(), 10.0);
}
