use thiserror::Error;

#[derive(Debug, Error)]
pub enum DspError {
    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),
}
