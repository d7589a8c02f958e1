//! Raspberry Pi GPIO pins for the H-bridge inputs and the nFAULT line.

use ecu_traits::{DigitalInput, DigitalOutput, HwResult};
use rppal::gpio::{InputPin, OutputPin};
use tracing::debug;

use crate::error::{HwError, Result};

pub use rppal::gpio::Gpio;

/// Open the GPIO peripheral shared by every pin.
pub fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))
}

pub struct GpioOutput {
    pin: OutputPin,
}

impl GpioOutput {
    /// Claim a BCM pin as a push-pull output, initially low.
    pub fn open(gpio: &Gpio, bcm: u8) -> Result<Self> {
        let pin = gpio
            .get(bcm)
            .map_err(|e| HwError::Gpio(format!("open output pin {bcm}: {e}")))?
            .into_output_low();
        debug!(bcm, "gpio output claimed");
        Ok(Self { pin })
    }
}

impl DigitalOutput for GpioOutput {
    fn set_level(&mut self, high: bool) -> HwResult<()> {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

pub struct GpioInput {
    pin: InputPin,
}

impl GpioInput {
    /// Claim a BCM pin as an input with pull-up (nFAULT is open-drain, active low).
    pub fn open(gpio: &Gpio, bcm: u8) -> Result<Self> {
        let pin = gpio
            .get(bcm)
            .map_err(|e| HwError::Gpio(format!("open input pin {bcm}: {e}")))?
            .into_input_pullup();
        debug!(bcm, "gpio input claimed");
        Ok(Self { pin })
    }
}

impl DigitalInput for GpioInput {
    fn is_high(&mut self) -> HwResult<bool> {
        Ok(self.pin.is_high())
    }
}
