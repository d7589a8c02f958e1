//! Minimal capability interfaces the actuator logic is written against.
//!
//! Every platform (simulation, Raspberry Pi GPIO, tests) implements these and
//! injects them into `ecu_core::MotorDriver` at construction.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type used at the hardware trait boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A push-pull digital output.
pub trait DigitalOutput {
    fn set_level(&mut self, high: bool) -> HwResult<()>;

    fn set_high(&mut self) -> HwResult<()> {
        self.set_level(true)
    }

    fn set_low(&mut self) -> HwResult<()> {
        self.set_level(false)
    }
}

/// A digital input line.
pub trait DigitalInput {
    fn is_high(&mut self) -> HwResult<bool>;
}

/// A single analog channel read by a shared converter.
///
/// Implementations reconfigure the converter before each conversion, so reads
/// must never interleave.
pub trait AnalogInput {
    /// One-time front-end calibration, run during driver init.
    fn calibrate(&mut self) -> HwResult<()>;

    /// Start a conversion and poll for the result for at most `timeout`.
    /// Returns the raw 12-bit code (0..=4095).
    fn read_raw(&mut self, timeout: std::time::Duration) -> HwResult<u16>;
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn set_level(&mut self, high: bool) -> HwResult<()> {
        (**self).set_level(high)
    }
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn is_high(&mut self) -> HwResult<bool> {
        (**self).is_high()
    }
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn calibrate(&mut self) -> HwResult<()> {
        (**self).calibrate()
    }

    fn read_raw(&mut self, timeout: std::time::Duration) -> HwResult<u16> {
        (**self).read_raw(timeout)
    }
}
