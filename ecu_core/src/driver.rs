//! One H-bridge channel: direction and enable outputs, the active-low fault
//! line and the current-sense input.
//!
//! The driver keeps a moving average of the motor current and enforces two
//! safety cutoffs from [`MotorDriver::tick`]: an asserted fault line switches
//! the bridge off, and a direction held past the run timeout is braked.

use std::fmt;
use std::sync::Arc;

use ecu_traits::{AnalogInput, Clock, DigitalInput, DigitalOutput};
use eyre::WrapErr;
use tracing::{debug, trace, warn};

use crate::config::DriverCfg;
use crate::error::{BuildError, DriverFault, Result};
use crate::filter::CurrentFilter;
use crate::hw_error::report;
use crate::util::elapsed_ms;

/// Full-scale code of the 12-bit current converter.
pub const ADC_FULL_SCALE: u32 = 4095;

/// Ratio between the sense output and the motor current of the bridge.
pub const CURRENT_SCALING: f32 = 0.45;

/// Drive state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Never driven since construction.
    #[default]
    None,
    /// All inputs low; the motor coasts de-energized.
    Off,
    Left,
    Right,
    /// Both inputs high with enable; windings shorted.
    Stop,
}

impl Direction {
    /// (in1, in2, enable) levels, or `None` when the pins are left alone.
    fn levels(self) -> Option<(bool, bool, bool)> {
        match self {
            Self::None => None,
            Self::Off => Some((false, false, false)),
            Self::Left => Some((false, true, true)),
            Self::Right => Some((true, false, true)),
            Self::Stop => Some((true, true, true)),
        }
    }

    #[inline]
    pub fn is_driving(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

/// Pins owned by one driver.
pub struct DriverPins<O, I, A> {
    pub in1: O,
    pub in2: O,
    pub enable: O,
    /// Active-low nFAULT output of the bridge.
    pub fault: I,
    pub current: A,
}

/// Convert a raw converter code to milliamps.
///
/// The reference is divided by full scale and truncated before multiplying by
/// the code. Existing current thresholds were tuned against this exact
/// rounding, so the expression must not be rearranged.
#[inline]
pub fn raw_to_milliamps(raw: u16, ref_microvolts: u32, load_milliohms: u32) -> u16 {
    let uv_per_code = ref_microvolts / ADC_FULL_SCALE;
    let sense_ma = uv_per_code.saturating_mul(u32::from(raw)) / load_milliohms;
    (sense_ma as f32 / CURRENT_SCALING) as u16
}

type FaultHandler = Box<dyn FnMut(DriverFault)>;

pub struct MotorDriver<O, I, A> {
    name: &'static str,
    pins: DriverPins<O, I, A>,
    cfg: DriverCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    state: Direction,
    current: CurrentFilter,
    last_action_ms: u32,
    last_tick_ms: u32,
    fault_latched: bool,
    on_fault: Option<FaultHandler>,
}

impl<O, I, A> fmt::Debug for MotorDriver<O, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorDriver")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("current_ma", &self.current.average())
            .field("last_action_ms", &self.last_action_ms)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl<O, I, A> MotorDriver<O, I, A>
where
    O: DigitalOutput,
    I: DigitalInput,
    A: AnalogInput,
{
    pub fn new(
        name: &'static str,
        pins: DriverPins<O, I, A>,
        cfg: DriverCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> std::result::Result<Self, BuildError> {
        if cfg.load_milliohms == 0 {
            return Err(BuildError::InvalidConfig("load_milliohms must be > 0"));
        }
        if cfg.tick_interval_ms == 0 {
            return Err(BuildError::InvalidConfig("tick_interval_ms must be >= 1"));
        }
        if cfg.run_timeout_ms == 0 {
            return Err(BuildError::InvalidConfig("run_timeout_ms must be >= 1"));
        }
        Ok(Self {
            name,
            pins,
            cfg,
            clock,
            state: Direction::None,
            current: CurrentFilter::new(),
            last_action_ms: 0,
            last_tick_ms: 0,
            fault_latched: false,
            on_fault: None,
        })
    }

    /// Drive every output low and run the converter's one-time calibration.
    pub fn init(&mut self) -> Result<()> {
        self.write_pins(false, false, false)
            .wrap_err_with(|| format!("{}: init outputs", self.name))?;
        self.pins
            .current
            .calibrate()
            .map_err(report)
            .wrap_err_with(|| format!("{}: calibrate current sense", self.name))?;
        debug!(driver = self.name, "driver initialized");
        Ok(())
    }

    pub fn set_current_params(
        &mut self,
        ref_microvolts: u32,
        load_milliohms: u32,
    ) -> std::result::Result<(), BuildError> {
        if load_milliohms == 0 {
            return Err(BuildError::InvalidConfig("load_milliohms must be > 0"));
        }
        self.cfg.ref_microvolts = ref_microvolts;
        self.cfg.load_milliohms = load_milliohms;
        Ok(())
    }

    pub fn set_timeout(&mut self, run_timeout_ms: u32) -> std::result::Result<(), BuildError> {
        if run_timeout_ms == 0 {
            return Err(BuildError::InvalidConfig("run_timeout_ms must be >= 1"));
        }
        self.cfg.run_timeout_ms = run_timeout_ms;
        Ok(())
    }

    /// Register the handler invoked from `tick` whenever a fault is raised.
    pub fn set_fault_handler(&mut self, handler: impl FnMut(DriverFault) + 'static) {
        self.on_fault = Some(Box::new(handler));
    }

    /// Apply `direction` to the bridge and restart the run timer.
    pub fn act(&mut self, direction: Direction) -> Result<()> {
        if let Some((in1, in2, enable)) = direction.levels() {
            self.write_pins(in1, in2, enable)
                .wrap_err_with(|| format!("{}: drive {direction:?}", self.name))?;
        }
        if self.state != direction {
            trace!(driver = self.name, from = ?self.state, to = ?direction, "act");
        }
        self.state = direction;
        self.last_action_ms = self.clock.now_ms();
        Ok(())
    }

    /// Reverse a running motor; anything not running is driven right.
    pub fn act_invert(&mut self) -> Result<()> {
        let next = match self.state {
            Direction::Right => Direction::Left,
            _ => Direction::Right,
        };
        self.act(next)
    }

    /// Filtered motor current. With `force`, a fresh sample is pushed first.
    pub fn current_milliamps(&mut self, force: bool) -> Result<u16> {
        if force {
            let ma = self.sample_current()?;
            self.current.push(ma);
        }
        Ok(self.current.average())
    }

    /// Take one sample and seed the whole filter window with it.
    pub fn probe_current(&mut self) -> Result<u16> {
        let ma = self.sample_current()?;
        self.current.reset(ma);
        Ok(ma)
    }

    /// Housekeeping pass; does nothing until `tick_interval_ms` elapsed since the last one.
    ///
    /// Samples current, then checks the fault line and the run timeout. At most
    /// one fault is raised; an asserted fault line takes precedence.
    pub fn tick(&mut self, now: u32) -> Result<Option<DriverFault>> {
        if elapsed_ms(now, self.last_tick_ms) < self.cfg.tick_interval_ms {
            return Ok(None);
        }
        self.last_tick_ms = now;

        self.current_milliamps(true)?;

        let line_ok = self
            .pins
            .fault
            .is_high()
            .map_err(report)
            .wrap_err_with(|| format!("{}: read fault line", self.name))?;

        let fault = if !line_ok {
            self.act(Direction::Off)?;
            Some(DriverFault::HardwareFault)
        } else if self.state.is_driving()
            && elapsed_ms(now, self.last_action_ms) > self.cfg.run_timeout_ms
        {
            self.act(Direction::Stop)?;
            Some(DriverFault::ActionTimeout)
        } else {
            None
        };

        if line_ok && self.fault_latched {
            self.fault_latched = false;
            debug!(driver = self.name, "fault line released");
        }
        match fault {
            // Logged once per assertion; the handler still sees every tick.
            Some(DriverFault::HardwareFault) if !self.fault_latched => {
                self.fault_latched = true;
                warn!(
                    driver = self.name,
                    code = DriverFault::HardwareFault.code(),
                    "fault line asserted; bridge off"
                );
            }
            Some(DriverFault::ActionTimeout) => {
                warn!(
                    driver = self.name,
                    code = DriverFault::ActionTimeout.code(),
                    timeout_ms = self.cfg.run_timeout_ms,
                    "run timeout; braking"
                );
            }
            _ => {}
        }

        if let (Some(f), Some(handler)) = (fault, self.on_fault.as_mut()) {
            handler(f);
        }
        Ok(fault)
    }

    /// Read the fault line directly; true while the bridge reports a fault.
    pub fn fault_asserted(&mut self) -> Result<bool> {
        let high = self
            .pins
            .fault
            .is_high()
            .map_err(report)
            .wrap_err_with(|| format!("{}: read fault line", self.name))?;
        Ok(!high)
    }

    pub fn state(&self) -> Direction {
        self.state
    }

    pub fn last_action_ms(&self) -> u32 {
        self.last_action_ms
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    fn sample_current(&mut self) -> Result<u16> {
        let raw = self
            .pins
            .current
            .read_raw(self.cfg.conversion_timeout)
            .map_err(report)
            .wrap_err_with(|| format!("{}: sample current", self.name))?;
        let ma = raw_to_milliamps(raw, self.cfg.ref_microvolts, self.cfg.load_milliohms);
        trace!(driver = self.name, raw, ma, "current sample");
        Ok(ma)
    }

    fn write_pins(&mut self, in1: bool, in2: bool, enable: bool) -> Result<()> {
        self.pins.in1.set_level(in1).map_err(report)?;
        self.pins.in2.set_level(in2).map_err(report)?;
        self.pins.enable.set_level(enable).map_err(report)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBridge;
    use ecu_traits::ManualClock;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(20, 13)]
    #[case(2000, 1446)]
    #[case(4095, 2962)]
    fn conversion_truncates_reference_first(#[case] raw: u16, #[case] ma: u16) {
        assert_eq!(raw_to_milliamps(raw, 3_324_000, 2490), ma);
    }

    #[rstest]
    #[case(Direction::Off, (false, false, false))]
    #[case(Direction::Left, (false, true, true))]
    #[case(Direction::Right, (true, false, true))]
    #[case(Direction::Stop, (true, true, true))]
    fn truth_table(#[case] dir: Direction, #[case] levels: (bool, bool, bool)) {
        let bridge = MockBridge::new();
        let mut d = MotorDriver::new(
            "t",
            bridge.pins(),
            DriverCfg::default(),
            Arc::new(ManualClock::new()),
        )
        .unwrap();
        d.act(dir).unwrap();
        assert_eq!(bridge.levels(), levels);
        assert_eq!(d.state(), dir);
    }

    #[test]
    fn none_leaves_pins_untouched() {
        let bridge = MockBridge::new();
        let mut d = MotorDriver::new(
            "t",
            bridge.pins(),
            DriverCfg::default(),
            Arc::new(ManualClock::new()),
        )
        .unwrap();
        d.act(Direction::Stop).unwrap();
        let writes = bridge.writes();
        d.act(Direction::None).unwrap();
        assert_eq!(bridge.writes(), writes);
        assert_eq!(bridge.levels(), (true, true, true));
        assert_eq!(d.state(), Direction::None);
    }

    #[test]
    fn zero_load_is_rejected() {
        let cfg = DriverCfg {
            load_milliohms: 0,
            ..DriverCfg::default()
        };
        let err = MotorDriver::new(
            "t",
            MockBridge::new().pins(),
            cfg,
            Arc::new(ManualClock::new()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("load_milliohms"));
    }
}
