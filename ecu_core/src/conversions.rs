//! `From` implementations bridging `ecu_config` types to `ecu_core` types.

use std::time::Duration;

use crate::config::{ActuatorCfg, DriverCfg};

// ── DriverCfg ────────────────────────────────────────────────────────────────

impl DriverCfg {
    /// Driver parameters from the `[driver]` and `[adc]` config sections.
    pub fn from_config(driver: &ecu_config::DriverCfg, adc: &ecu_config::AdcCfg) -> Self {
        Self {
            ref_microvolts: driver.ref_microvolts,
            load_milliohms: driver.load_milliohms,
            run_timeout_ms: driver.run_timeout_ms,
            tick_interval_ms: driver.tick_interval_ms,
            conversion_timeout: Duration::from_millis(adc.conversion_timeout_ms),
        }
    }
}

impl From<&ecu_config::Config> for DriverCfg {
    fn from(c: &ecu_config::Config) -> Self {
        Self::from_config(&c.driver, &c.adc)
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&ecu_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &ecu_config::ActuatorCfg) -> Self {
        Self {
            idle_current_ma: c.idle_current_ma,
            settle_delay: Duration::from_millis(u64::from(c.settle_delay_ms)),
            current_check_interval_ms: c.current_check_interval_ms,
            stale_input_ms: c.stale_input_ms,
            stale_input_guard: c.stale_input_guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_agree_across_crates() {
        let d = DriverCfg::from_config(
            &ecu_config::DriverCfg::default(),
            &ecu_config::AdcCfg::default(),
        );
        assert_eq!(d, DriverCfg::default());
        let a = ActuatorCfg::from(&ecu_config::ActuatorCfg::default());
        assert_eq!(a, ActuatorCfg::default());
    }
}
