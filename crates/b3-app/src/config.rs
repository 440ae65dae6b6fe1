//! Live config file: a flat `key = value` record, re-read on every tick of
//! the main loop. Unknown keys and unparsable values are skipped silently so
//! a hand-edited file mid-playback never aborts the session.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error accessing config file: {0}")]
    Io(#[from] io::Error),
}

pub mod defaults {
    pub const LPF_CUTOFF_HZ: f32 = 500.0;
    pub const HPF_CUTOFF_HZ: f32 = 5_000.0;
    pub const CHUNK_SIZE_MS: u32 = 50;
    pub const BUFFER_CHUNKS: u32 = 3;
    pub const BODY_THRESHOLD: f32 = 3_000.0;
    pub const MOUTH_THRESHOLD: f32 = 3_000.0;
    pub const RMS_WINDOW_MS: u32 = 20;
    pub const FLIP_INTERVAL_MS: u64 = 500;

    /// Base directory that `-f FILE` is resolved against, matching the
    /// fixed-directory convention of the control process this project
    /// reimplements.
    pub const AUDIO_FILES_PATH: &str = "audio_files";
}

/// Everything the running session can be tuned by, split between values
/// re-read every tick (filter cutoffs, thresholds, window/flip timing,
/// buffer depth) and values latched once at PLAY-start (chunk size).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub lpf_cutoff: f32,
    pub hpf_cutoff: f32,
    pub chunk_size_ms: u32,
    pub buffer_chunks: u32,
    pub body_threshold: f32,
    pub mouth_threshold: f32,
    pub rms_window_ms: u32,
    pub flip_interval_ms: u64,
    pub seek_time_us: u64,
}

impl Default for Config {
    fn default() -> Self {
        use defaults::*;
        Self {
            lpf_cutoff: LPF_CUTOFF_HZ,
            hpf_cutoff: HPF_CUTOFF_HZ,
            chunk_size_ms: CHUNK_SIZE_MS,
            buffer_chunks: BUFFER_CHUNKS,
            body_threshold: BODY_THRESHOLD,
            mouth_threshold: MOUTH_THRESHOLD,
            rms_window_ms: RMS_WINDOW_MS,
            flip_interval_ms: FLIP_INTERVAL_MS,
            seek_time_us: 0,
        }
    }
}

impl Config {
    /// Re-read recognised keys from `path` in place. A missing file just
    /// leaves the current values untouched; it is not an error condition.
    pub fn poll(&mut self, path: &Path) {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return,
        };

        for line in BufReader::new(file).lines().map_while(Result::ok) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "lpf_cutoff" => assign(&mut self.lpf_cutoff, value),
                "hpf_cutoff" => assign(&mut self.hpf_cutoff, value),
                "body_threshold" => assign(&mut self.body_threshold, value),
                "mouth_threshold" => assign(&mut self.mouth_threshold, value),
                "rms_window_ms" => assign(&mut self.rms_window_ms, value),
                "flip_interval_ms" => assign(&mut self.flip_interval_ms, value),
                "buffer_count" => assign(&mut self.buffer_chunks, value),
                "chunk_size_ms" => assign(&mut self.chunk_size_ms, value),
                _ => {}
            }
        }
    }

    /// Write the current record back to `path`, banner-separating the keys
    /// that take effect live from the one latched at PLAY-start.
    pub fn print_settings(&self, path: &Path) -> Result<(), ConfigError> {
        let mut file = File::create(path)?;
        writeln!(file, "# live-tunable, re-read every tick")?;
        writeln!(file, "lpf_cutoff = {}", self.lpf_cutoff)?;
        writeln!(file, "hpf_cutoff = {}", self.hpf_cutoff)?;
        writeln!(file, "body_threshold = {}", self.body_threshold)?;
        writeln!(file, "mouth_threshold = {}", self.mouth_threshold)?;
        writeln!(file, "rms_window_ms = {}", self.rms_window_ms)?;
        writeln!(file, "flip_interval_ms = {}", self.flip_interval_ms)?;
        writeln!(file, "buffer_count = {}", self.buffer_chunks)?;
        writeln!(file)?;
        writeln!(file, "# boot-only, latched when playback starts")?;
        writeln!(file, "chunk_size_ms = {}", self.chunk_size_ms)?;
        Ok(())
    }
}

fn assign<T: std::str::FromStr>(field: &mut T, value: &str) {
    if let Ok(parsed) = value.parse() {
        *field = parsed;
    }
}
