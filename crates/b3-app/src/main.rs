//! Logging behavior:
//! - Writes structured logs to stderr only; this is a single-session control
//!   process with no log file to rotate.
//! - Default level is INFO. Control via RUST_LOG, e.g. `RUST_LOG=b3_app=debug`.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use b3_actuator::{ActuatorScheduler, Gpio, MockGpio, SharedThresholds};
use b3_app::config::{self, Config};
use b3_app::decoder::{Decoder, WavDecoder};
use b3_app::error::AppError;
use b3_app::pipeline::AudioPipeline;
use b3_app::signal;
use b3_app::sound_device::CpalSoundDevice;
use b3_dsp::frame_queue;
use b3_foundation::clock::real_clock;
use b3_foundation::state::RunState;
use b3_telemetry::ActuatorMetrics;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Decode an audio file and drive the body and mouth actuators in time with
/// playback.
#[derive(Parser, Debug)]
#[command(name = "b3", version, about)]
struct Cli {
    /// Path to the audio file to play, resolved relative to the audio files
    /// directory.
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Verbose logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Low-pass filter cutoff in Hz, driving the body actuator.
    #[arg(long = "lpf", default_value_t = config::defaults::LPF_CUTOFF_HZ)]
    lpf_hz: f32,

    /// High-pass filter cutoff in Hz, driving the mouth actuator.
    #[arg(long = "hpf", default_value_t = config::defaults::HPF_CUTOFF_HZ)]
    hpf_hz: f32,

    /// Start playback this many microseconds into the file.
    #[arg(long = "seek", default_value_t = 0)]
    seek_us: u64,

    /// Body actuator RMS threshold.
    #[arg(long = "body", default_value_t = config::defaults::BODY_THRESHOLD)]
    body_threshold: f32,

    /// Mouth actuator RMS threshold.
    #[arg(long = "mouth", default_value_t = config::defaults::MOUTH_THRESHOLD)]
    mouth_threshold: f32,

    /// Live config file path, polled every tick.
    #[arg(long = "config", default_value = "b3.ini")]
    config_path: PathBuf,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config {
        lpf_cutoff: cli.lpf_hz,
        hpf_cutoff: cli.hpf_hz,
        body_threshold: cli.body_threshold,
        mouth_threshold: cli.mouth_threshold,
        seek_time_us: cli.seek_us,
        ..Config::default()
    };
    config.poll(&cli.config_path);

    let should_exit = signal::install_sigint_handler();

    let audio_path = PathBuf::from(config::defaults::AUDIO_FILES_PATH).join(&cli.file);
    let decoder = WavDecoder::open(&audio_path, config.seek_time_us)?;
    tracing::info!(
        file = %audio_path.display(),
        sample_rate = decoder.sample_rate(),
        channels = decoder.channels(),
        "loaded audio file"
    );

    let clock = real_clock();
    let (producer, consumer) = frame_queue(config.buffer_chunks as usize + 4);

    let thresholds = Arc::new(SharedThresholds::new(
        config.body_threshold,
        config.mouth_threshold,
        config.rms_window_ms,
        config.flip_interval_ms,
    ));

    let gpio: Box<dyn Gpio> = Box::new(MockGpio::new());
    let mut scheduler = ActuatorScheduler::start(
        gpio,
        decoder.sample_rate(),
        thresholds.clone(),
        consumer,
        clock.clone(),
        ActuatorMetrics::new(),
    );

    let mut pipeline = AudioPipeline::new(CpalSoundDevice::new(), producer, clock);
    pipeline.load_file(decoder);

    loop {
        if should_exit.load(Ordering::Relaxed) {
            tracing::info!("shutdown signal received");
            break;
        }

        config.poll(&cli.config_path);
        thresholds.set_body_threshold(config.body_threshold);
        thresholds.set_mouth_threshold(config.mouth_threshold);
        thresholds.set_rms_window_ms(config.rms_window_ms);
        thresholds.set_flip_interval_ms(config.flip_interval_ms);

        pipeline.tick(RunState::Playing, &config)?;

        if pipeline.is_stopped() {
            tracing::info!("playback finished");
            break;
        }
    }

    pipeline.tick(RunState::Stopped, &config)?;
    scheduler.stop();
    let _ = config.print_settings(&cli.config_path);

    Ok(())
}
