//! Playback backend. `SoundDevice` is the seam the pipeline drives;
//! `CpalSoundDevice` is the only concrete backend, feeding a `cpal` output
//! stream through a small ring buffer so `write` stays non-blocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::RingBuffer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoundDeviceError {
    #[error("failed to open output device: {0}")]
    Open(String),
    #[error("device under-run, recovering")]
    Underrun,
}

/// Output sink the pipeline writes decoded PCM to.
pub trait SoundDevice: Send {
    /// Negotiate format ahead of playback. Returns the frames-per-period the
    /// device will actually use, which may differ from what was requested.
    fn update_channel_data(
        &mut self,
        sample_rate: u32,
        channels: u16,
        frames_per_period: usize,
    ) -> Result<usize, SoundDeviceError>;

    fn write(&mut self, pcm: &[i16]) -> Result<(), SoundDeviceError>;

    fn close(&mut self);
}

pub struct CpalSoundDevice {
    stream: Option<cpal::Stream>,
    producer: Option<rtrb::Producer<i16>>,
    under_runs: Arc<AtomicU64>,
}

impl Default for CpalSoundDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalSoundDevice {
    pub fn new() -> Self {
        Self {
            stream: None,
            producer: None,
            under_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn under_run_count(&self) -> u64 {
        self.under_runs.load(Ordering::Relaxed)
    }
}

impl SoundDevice for CpalSoundDevice {
    fn update_channel_data(
        &mut self,
        sample_rate: u32,
        channels: u16,
        frames_per_period: usize,
    ) -> Result<usize, SoundDeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SoundDeviceError::Open("no default output device".to_string()))?;

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = (frames_per_period * channels as usize * 4).max(channels as usize);
        let (producer, mut consumer) = RingBuffer::<i16>::new(capacity);
        let under_runs = self.under_runs.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _| {
                    for sample in data.iter_mut() {
                        *sample = consumer.pop().unwrap_or_else(|_| {
                            under_runs.fetch_add(1, Ordering::Relaxed);
                            0
                        });
                    }
                },
                |err| tracing::warn!("cpal output stream error: {err}"),
                None,
            )
            .map_err(|e| SoundDeviceError::Open(e.to_string()))?;

        stream
            .play()
            .map_err(|e| SoundDeviceError::Open(e.to_string()))?;

        self.stream = Some(stream);
        self.producer = Some(producer);
        Ok(frames_per_period)
    }

    fn write(&mut self, pcm: &[i16]) -> Result<(), SoundDeviceError> {
        let producer = self
            .producer
            .as_mut()
            .ok_or_else(|| SoundDeviceError::Open("device not negotiated".to_string()))?;
        for &sample in pcm {
            if producer.push(sample).is_err() {
                return Err(SoundDeviceError::Underrun);
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
        self.producer = None;
    }
}

/// In-memory sink recording everything written to it, for pipeline tests.
#[derive(Debug, Default)]
pub struct MockSoundDevice {
    pub negotiated_frames: Option<usize>,
    pub written: Vec<i16>,
    pub closed: bool,
}

impl MockSoundDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SoundDevice for MockSoundDevice {
    fn update_channel_data(
        &mut self,
        _sample_rate: u32,
        _channels: u16,
        frames_per_period: usize,
    ) -> Result<usize, SoundDeviceError> {
        self.negotiated_frames = Some(frames_per_period);
        Ok(frames_per_period)
    }

    fn write(&mut self, pcm: &[i16]) -> Result<(), SoundDeviceError> {
        self.written.extend_from_slice(pcm);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
