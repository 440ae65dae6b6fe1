use thiserror::Error;

use crate::config::ConfigError;
use crate::decoder::DecoderError;
use crate::sound_device::SoundDeviceError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("precondition violation: {0}")]
    Precondition(String),

    #[error(transparent)]
    Foundation(#[from] b3_foundation::error::FoundationError),

    #[error(transparent)]
    Actuator(#[from] b3_actuator::ActuatorError),

    #[error(transparent)]
    Dsp(#[from] b3_dsp::DspError),

    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error(transparent)]
    SoundDevice(#[from] SoundDeviceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
