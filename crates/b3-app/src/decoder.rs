//! Audio file decoding. `Decoder` is the seam the pipeline drives; `WavDecoder`
//! is the only concrete backend, reading 16-bit PCM WAV via `hound`.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("failed to open audio file: {0}")]
    Open(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// A single-file audio source, read chunk by chunk as interleaved PCM16.
pub trait Decoder: Send {
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn current_timestamp_us(&self) -> u64;

    /// Fill `dst` with up to `dst.len()` interleaved samples, returning how
    /// many were actually written. Fewer than requested — including zero —
    /// means the file is exhausted.
    fn read_chunk(&mut self, dst: &mut [i16]) -> usize;

    fn close(&mut self);
}

pub struct WavDecoder {
    samples: Vec<i16>,
    cursor: usize,
    sample_rate: u32,
    channels: u16,
}

impl WavDecoder {
    pub fn open(path: &Path, seek_us: u64) -> Result<Self, DecoderError> {
        let mut reader =
            hound::WavReader::open(path).map_err(|e| DecoderError::Open(e.to_string()))?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(DecoderError::UnsupportedFormat(format!(
                "{:?} {}-bit, only 16-bit PCM is supported",
                spec.sample_format, spec.bits_per_sample
            )));
        }

        let samples: Vec<i16> = reader.samples::<i16>().filter_map(Result::ok).collect();
        let channels = spec.channels;
        let sample_rate = spec.sample_rate;

        let seek_frames = (seek_us as u128 * sample_rate as u128 / 1_000_000) as usize;
        let cursor = seek_frames.saturating_mul(channels as usize).min(samples.len());

        Ok(Self {
            samples,
            cursor,
            sample_rate,
            channels,
        })
    }
}

impl Decoder for WavDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn current_timestamp_us(&self) -> u64 {
        let frame = self.cursor / self.channels.max(1) as usize;
        (frame as u64) * 1_000_000 / self.sample_rate.max(1) as u64
    }

    fn read_chunk(&mut self, dst: &mut [i16]) -> usize {
        let remaining = self.samples.len() - self.cursor;
        let n = remaining.min(dst.len());
        dst[..n].copy_from_slice(&self.samples[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    fn close(&mut self) {
        self.cursor = self.samples.len();
    }
}

/// In-memory decoder backed by a pre-generated sample buffer, used by tests
/// that need deterministic, hardware-free audio sources.
pub struct MockDecoder {
    samples: Vec<i16>,
    cursor: usize,
    sample_rate: u32,
    channels: u16,
}

impl MockDecoder {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            cursor: 0,
            sample_rate,
            channels,
        }
    }

    pub fn silence(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self::new(vec![0i16; frames * channels as usize], sample_rate, channels)
    }

    pub fn sine(sample_rate: u32, channels: u16, freq_hz: f32, frames: usize, amplitude: i16) -> Self {
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let v = (amplitude as f32 * (2.0 * std::f32::consts::PI * freq_hz * t).sin()) as i16;
            for _ in 0..channels {
                samples.push(v);
            }
        }
        Self::new(samples, sample_rate, channels)
    }
}

impl Decoder for MockDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn current_timestamp_us(&self) -> u64 {
        let frame = self.cursor / self.channels.max(1) as usize;
        (frame as u64) * 1_000_000 / self.sample_rate.max(1) as u64
    }

    fn read_chunk(&mut self, dst: &mut [i16]) -> usize {
        let remaining = self.samples.len() - self.cursor;
        let n = remaining.min(dst.len());
        dst[..n].copy_from_slice(&self.samples[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    fn close(&mut self) {
        self.cursor = self.samples.len();
    }
}
