use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EcuError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for current sample")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Fault raised by a motor driver during `tick`.
///
/// At most one is raised per tick; `HardwareFault` wins when both trip.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverFault {
    /// nFAULT asserted; the bridge was switched off.
    #[error("bridge fault line asserted")]
    HardwareFault = 0x01,
    /// Direction held past the run timeout; the bridge was braked.
    #[error("run timeout exceeded")]
    ActionTimeout = 0x02,
}

impl DriverFault {
    /// Numeric code as reported on the bus.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
