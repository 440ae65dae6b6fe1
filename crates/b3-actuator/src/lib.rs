pub mod gpio;
pub mod scheduler;

pub use gpio::{ActuatorError, Gpio, MockGpio, Pin, BODY_DUTY, MOUTH_DUTY};
pub use scheduler::{ActuatorScheduler, SharedThresholds, DEBUG_INTERVAL};
