use thiserror::Error;

/// Named output pins. Numbers follow the controller's wiring harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    BodyDirA,
    BodyDirB,
    BodySpeed,
    MouthDirA,
    MouthDirB,
    MouthSpeed,
}

impl Pin {
    pub fn number(self) -> u8 {
        match self {
            Pin::BodyDirA => 17,
            Pin::BodyDirB => 27,
            Pin::BodySpeed => 12,
            Pin::MouthDirA => 24,
            Pin::MouthDirB => 25,
            Pin::MouthSpeed => 13,
        }
    }

    pub const ALL: [Pin; 6] = [
        Pin::BodyDirA,
        Pin::BodyDirB,
        Pin::BodySpeed,
        Pin::MouthDirA,
        Pin::MouthDirB,
        Pin::MouthSpeed,
    ];
}

/// Duty cycle applied while a motor is driven, out of 255. ~90% duty leaves
/// headroom against stall current; both motors share the same convention.
pub const BODY_DUTY: u8 = (255 * 90 / 100) as u8;
pub const MOUTH_DUTY: u8 = (255 * 90 / 100) as u8;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("GPIO hardware init failed: {0}")]
    InitFailed(String),
}

/// Hardware abstraction the scheduler drives. A real backend talks to the
/// board's GPIO chip; `MockGpio` is a no-op double used in tests and as the
/// fallback when hardware init fails.
pub trait Gpio: Send {
    fn init(&mut self) -> Result<(), ActuatorError>;
    fn set_mode_output(&mut self, pin: Pin);
    fn write(&mut self, pin: Pin, high: bool);
    fn pwm(&mut self, pin: Pin, duty: u8);
    fn flush_all_low(&mut self);
    fn terminate(&mut self);
}

/// In-memory `Gpio` that records the last value written to each pin.
/// Used both as a test double and as the degraded-mode fallback when real
/// hardware initialization fails.
#[derive(Debug, Default, Clone)]
pub struct MockGpio {
    pub digital: std::collections::HashMap<Pin, bool>,
    pub duty: std::collections::HashMap<Pin, u8>,
    pub write_count: u64,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Gpio for MockGpio {
    fn init(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }

    fn set_mode_output(&mut self, _pin: Pin) {}

    fn write(&mut self, pin: Pin, high: bool) {
        self.digital.insert(pin, high);
        self.write_count += 1;
    }

    fn pwm(&mut self, pin: Pin, duty: u8) {
        self.duty.insert(pin, duty);
        self.write_count += 1;
    }

    fn flush_all_low(&mut self) {
        for pin in Pin::ALL {
            self.digital.insert(pin, false);
            self.duty.insert(pin, 0);
        }
    }

    fn terminate(&mut self) {
        self.flush_all_low();
    }
}
