//! Runtime parameters of drivers and controllers.

use std::time::Duration;

/// Electrical and timing parameters of one [`MotorDriver`](crate::MotorDriver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCfg {
    /// Converter reference voltage in microvolts.
    pub ref_microvolts: u32,
    /// Current-sense load resistor in milliohms.
    pub load_milliohms: u32,
    /// Longest a drive direction may be held before `tick` brakes.
    pub run_timeout_ms: u32,
    /// Minimum spacing between housekeeping passes in `tick`.
    pub tick_interval_ms: u32,
    /// Upper bound for a single current conversion.
    pub conversion_timeout: Duration,
}

impl Default for DriverCfg {
    fn default() -> Self {
        Self {
            ref_microvolts: 3_324_000,
            load_milliohms: 2490,
            run_timeout_ms: 30_000,
            tick_interval_ms: 15,
            conversion_timeout: Duration::from_millis(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCfg {
    /// Filtered current (mA) at or above which the actuator is under load.
    pub idle_current_ma: u16,
    /// Settle time before each calibration probe.
    pub settle_delay: Duration,
    pub current_check_interval_ms: u32,
    pub stale_input_ms: u32,
    /// Stop analog-driven motion when the stick stream goes quiet.
    pub stale_input_guard: bool,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            idle_current_ma: 100,
            settle_delay: Duration::from_millis(50),
            current_check_interval_ms: 50,
            stale_input_ms: 400,
            stale_input_guard: true,
        }
    }
}
