//! Audio pipeline: decodes chunks, mixes to mono, runs them through the LPF
//! and HPF biquads, submits the filtered pair to the actuator queue, and
//! writes the original PCM to the sound device. Drives the run-state machine
//! directly from the two transitions it understands (`Stopped` <-> `Playing`);
//! `Paused` passes straight through to `StateManager`, which is a no-op.

use std::time::{Duration, Instant};

use b3_dsp::{Biquad, FilterKind, FilteredFrame, FrameProducer};
use b3_foundation::clock::{LapTimer, SharedClock};
use b3_foundation::state::{RunState, StateManager};

use crate::config::Config;
use crate::decoder::Decoder;
use crate::error::AppError;
use crate::sound_device::SoundDevice;

const BIQUAD_Q: f32 = 0.707;

pub struct AudioPipeline<D: Decoder, S: SoundDevice> {
    decoder: Option<D>,
    device: S,
    state: StateManager,
    producer: FrameProducer,
    clock: SharedClock,
    lap: LapTimer,

    lpf: Option<Biquad>,
    hpf: Option<Biquad>,

    sample_rate: u32,
    channels: u16,
    chunk_frames: usize,
    chunk_duration: Duration,
    buffer_chunks: u32,
    next_deadline: Instant,

    pre_fill: bool,
    under_run_streak: u32,
    stop_requested: bool,
}

impl<D: Decoder, S: SoundDevice> AudioPipeline<D, S> {
    pub fn new(device: S, producer: FrameProducer, clock: SharedClock) -> Self {
        let next_deadline = clock.now();
        let lap = LapTimer::new(clock.clone());
        Self {
            decoder: None,
            device,
            state: StateManager::new(),
            producer,
            clock,
            lap,
            lpf: None,
            hpf: None,
            sample_rate: 0,
            channels: 0,
            chunk_frames: 0,
            chunk_duration: Duration::ZERO,
            buffer_chunks: 0,
            next_deadline,
            pre_fill: true,
            under_run_streak: 0,
            stop_requested: false,
        }
    }

    pub fn load_file(&mut self, decoder: D) {
        self.decoder = Some(decoder);
    }

    pub fn state(&self) -> RunState {
        self.state.current()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == RunState::Stopped
    }

    /// Microseconds of wall-clock time since the current (or most recent)
    /// PLAY-start, for diagnostics.
    pub fn elapsed_playback_us(&self) -> u64 {
        self.lap.elapsed_us()
    }

    /// Drive the pipeline one step towards `target`, applying live config
    /// values before any frame is processed.
    pub fn tick(&mut self, target: RunState, config: &Config) -> Result<(), AppError> {
        if self.state.current() != target {
            self.transition(target, config)?;
        }

        if self.state.current() != RunState::Playing {
            return Ok(());
        }

        if let Some(lpf) = self.lpf.as_mut() {
            lpf.set_cutoff(config.lpf_cutoff);
        }
        if let Some(hpf) = self.hpf.as_mut() {
            hpf.set_cutoff(config.hpf_cutoff);
        }

        let now = self.clock.now();
        let remaining = self.next_deadline.saturating_duration_since(now);
        self.clock.sleep(remaining.min(self.chunk_duration));

        if self.pre_fill {
            for _ in 0..self.buffer_chunks.saturating_sub(1) {
                if self.stop_requested {
                    break;
                }
                self.process_chunk()?;
            }
            self.pre_fill = false;
        }

        if !self.stop_requested {
            self.process_chunk()?;
        }

        if remaining.is_zero() {
            self.under_run_streak = self.under_run_streak.saturating_add(1);
            if self.under_run_streak >= self.buffer_chunks {
                self.pre_fill = true;
                self.under_run_streak = 0;
            }
        } else {
            self.under_run_streak = self.under_run_streak.saturating_sub(1);
        }

        if self.stop_requested {
            self.transition(RunState::Stopped, config)?;
        }

        Ok(())
    }

    fn transition(&mut self, to: RunState, config: &Config) -> Result<(), AppError> {
        match (self.state.current(), to) {
            (RunState::Stopped, RunState::Playing) => {
                let decoder = self
                    .decoder
                    .as_ref()
                    .ok_or_else(|| AppError::Precondition("no file loaded".to_string()))?;

                let desired_frames =
                    (config.chunk_size_ms as u64 * decoder.sample_rate() as u64 / 1000) as usize;
                let negotiated = self.device.update_channel_data(
                    decoder.sample_rate(),
                    decoder.channels(),
                    desired_frames.max(1),
                )?;
                if negotiated != desired_frames {
                    tracing::warn!(desired_frames, negotiated, "sound device adjusted chunk size");
                }

                self.sample_rate = decoder.sample_rate();
                self.channels = decoder.channels();
                self.chunk_frames = negotiated.max(1);
                self.chunk_duration =
                    Duration::from_micros(self.chunk_frames as u64 * 1_000_000 / self.sample_rate.max(1) as u64);
                self.buffer_chunks = config.buffer_chunks;

                self.lpf = Some(Biquad::new(self.sample_rate as f32, config.lpf_cutoff, BIQUAD_Q, 1.0, FilterKind::Lpf)?);
                self.hpf = Some(Biquad::new(self.sample_rate as f32, config.hpf_cutoff, BIQUAD_Q, 1.0, FilterKind::Hpf)?);

                self.next_deadline = self.clock.now();
                self.stop_requested = false;
                self.pre_fill = true;
                self.under_run_streak = 0;
                self.lap.start();

                self.state.transition(RunState::Playing)?;
            }
            (RunState::Playing, RunState::Stopped) => {
                tracing::info!(elapsed_us = self.lap.elapsed_us(), "playback stopped");
                if let Some(mut decoder) = self.decoder.take() {
                    decoder.close();
                }
                self.device.close();
                self.lpf = None;
                self.hpf = None;
                self.state.transition(RunState::Stopped)?;
            }
            _ => {
                self.state.transition(to)?;
            }
        }
        Ok(())
    }

    fn process_chunk(&mut self) -> Result<(), AppError> {
        let channels = self.channels.max(1) as usize;
        let frame_samples = self.chunk_frames * channels;
        let mut pcm = vec![0i16; frame_samples];

        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| AppError::Precondition("no file loaded".to_string()))?;
        let read = decoder.read_chunk(&mut pcm);
        if read < frame_samples {
            self.stop_requested = true;
        }
        pcm.truncate(read);

        let frame_count = read / channels;
        let mut lpf_out = Vec::with_capacity(frame_count);
        let mut hpf_out = Vec::with_capacity(frame_count);

        let lpf = self.lpf.as_mut().expect("filters initialized at PLAY-start");
        let hpf = self.hpf.as_mut().expect("filters initialized at PLAY-start");

        for frame in pcm.chunks(channels) {
            let mono = frame.iter().map(|&s| s as f32).sum::<f32>() / frame.len().max(1) as f32;
            lpf_out.push(lpf.update(mono) as i16);
            hpf_out.push(hpf.update(mono) as i16);
        }

        if !lpf_out.is_empty() {
            let _ = self.producer.push(FilteredFrame {
                lpf: lpf_out,
                hpf: hpf_out,
                sample_rate: self.sample_rate,
            });
        }

        if let Err(e) = self.device.write(&pcm) {
            tracing::warn!("sound device write failed, recovering: {e}");
        }

        self.next_deadline += self.chunk_duration;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::MockDecoder;
    use crate::sound_device::MockSoundDevice;
    use b3_foundation::clock::test_clock;

    fn pipeline() -> (AudioPipeline<MockDecoder, MockSoundDevice>, b3_dsp::FrameConsumer) {
        let (producer, consumer) = b3_dsp::frame_queue(64);
        let clock = test_clock();
        (AudioPipeline::new(MockSoundDevice::new(), producer, clock), consumer)
    }

    #[test]
    fn play_without_loading_a_file_is_a_precondition_violation() {
        let (mut pipe, _c) = pipeline();
        let config = Config::default();
        let err = pipe.tick(RunState::Playing, &config).unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
    }

    #[test]
    fn short_final_chunk_transitions_back_to_stopped() {
        let (mut pipe, mut consumer) = pipeline();
        let mut config = Config::default();
        config.chunk_size_ms = 50;
        config.buffer_chunks = 1;
        pipe.load_file(MockDecoder::silence(1_000, 1, 30)); // less than one chunk at 50ms/1kHz (50 frames)

        pipe.tick(RunState::Playing, &config).unwrap();
        assert_eq!(pipe.state(), RunState::Stopped);
        assert!(consumer.try_pop().is_some());
    }

    #[test]
    fn playing_pipeline_emits_filtered_frames_matching_chunk_count() {
        let (mut pipe, mut consumer) = pipeline();
        let mut config = Config::default();
        config.chunk_size_ms = 10;
        config.buffer_chunks = 1;
        pipe.load_file(MockDecoder::silence(1_000, 1, 1_000));

        pipe.tick(RunState::Playing, &config).unwrap();
        let frame = consumer.try_pop().expect("one frame should have been queued");
        assert_eq!(frame.lpf.len(), 10); // 10ms @ 1kHz = 10 frames
    }

    #[test]
    fn forcing_stopped_mid_playback_closes_decoder_and_device() {
        let (mut pipe, _c) = pipeline();
        let mut config = Config::default();
        config.chunk_size_ms = 50;
        config.buffer_chunks = 1;
        pipe.load_file(MockDecoder::silence(44_100, 1, 44_100 * 10)); // long file

        pipe.tick(RunState::Playing, &config).unwrap();
        assert_eq!(pipe.state(), RunState::Playing);

        // Simulates the main loop observing a shutdown signal mid-playback.
        pipe.tick(RunState::Stopped, &config).unwrap();
        assert_eq!(pipe.state(), RunState::Stopped);
        assert!(pipe.decoder.is_none());
    }
}
