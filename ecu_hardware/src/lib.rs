//! Pin and converter backends for the body-control ECU.
//!
//! - [`sim`]: a clock-driven actuator plant exposing H-bridge pins, a fault
//!   line and a current-sense channel. Always available.
//! - `gpio` / `mcp3204`: Raspberry Pi backends over `rppal` (feature `hardware`).
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod mcp3204;

pub use sim::{SimActuator, SimActuatorCfg, SimCurrent, SimFault, SimPin, SimPosition};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{GpioInput, GpioOutput, open_gpio};
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use mcp3204::{AdcChannel, Mcp3204};
