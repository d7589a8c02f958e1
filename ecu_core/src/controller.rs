//! Position state machine for one actuator.
//!
//! Two command protocols feed it: the discrete toggle, which cycles through
//! open/stop/close, and the analog set stream, which is edge-triggered on the
//! previously received stick value. Two periodic sweeps end motion on their
//! own: a current drop means end of travel, a stale stick stream means the
//! source went away mid-move.

use std::sync::Arc;

use ecu_traits::{AnalogInput, Clock, DigitalInput, DigitalOutput};
use eyre::WrapErr;
use tracing::{debug, info, warn};

use crate::config::ActuatorCfg;
use crate::driver::{Direction, MotorDriver};
use crate::error::{DriverFault, Result};
use crate::status::ActuatorState;
use crate::util::elapsed_ms;

/// Stick values a healthy source keeps re-sending; exempt from the staleness cutoff.
const STICK_FULL_CLOSE: i8 = -100;
const STICK_NEUTRAL: i8 = 0;
const STICK_FULL_OPEN: i8 = 100;

pub struct ActuatorController<O, I, A> {
    driver: MotorDriver<O, I, A>,
    cfg: ActuatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    state: ActuatorState,
    previous: ActuatorState,
    last_position: i8,
    last_position_ms: u32,
    last_current_check_ms: u32,
}

impl<O, I, A> std::fmt::Debug for ActuatorController<O, I, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorController")
            .field("driver", &self.driver)
            .field("state", &self.state)
            .field("previous", &self.previous)
            .field("last_position", &self.last_position)
            .finish_non_exhaustive()
    }
}

impl<O, I, A> ActuatorController<O, I, A>
where
    O: DigitalOutput,
    I: DigitalInput,
    A: AnalogInput,
{
    pub fn new(driver: MotorDriver<O, I, A>, cfg: ActuatorCfg) -> Self {
        let clock = Arc::clone(driver.clock());
        Self {
            driver,
            cfg,
            clock,
            state: ActuatorState::Unknown,
            previous: ActuatorState::Closing,
            last_position: STICK_NEUTRAL,
            last_position_ms: 0,
            last_current_check_ms: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.driver.name()
    }

    pub fn init(&mut self) -> Result<()> {
        self.driver.init()
    }

    /// Find the starting position by probing the load in each direction.
    ///
    /// Blocks for one or two settle delays. The bridge is braked afterwards,
    /// and switched off if a probe fails.
    pub fn calibrate(&mut self) -> Result<ActuatorState> {
        let found = match self.probe_position() {
            Ok(state) => state,
            Err(e) => {
                if let Err(off) = self.driver.act(Direction::Off) {
                    warn!(
                        actuator = self.name(),
                        error = %off,
                        "could not switch bridge off after failed calibration"
                    );
                }
                return Err(e).wrap_err_with(|| format!("{}: calibration", self.name()));
            }
        };
        self.driver.act(Direction::Stop)?;
        self.state = found;
        self.previous = ActuatorState::Closing;
        self.last_position = STICK_NEUTRAL;
        info!(actuator = self.name(), state = %found, "calibrated");
        Ok(found)
    }

    fn probe_position(&mut self) -> Result<ActuatorState> {
        let idle = self.cfg.idle_current_ma;

        self.driver.act(Direction::Left)?;
        self.clock.sleep(self.cfg.settle_delay);
        let left = self.driver.probe_current()?;
        debug!(actuator = self.name(), ma = left, "left probe");
        if left <= idle {
            return Ok(ActuatorState::Closed);
        }

        self.driver.act(Direction::Right)?;
        self.clock.sleep(self.cfg.settle_delay);
        let right = self.driver.probe_current()?;
        debug!(actuator = self.name(), ma = right, "right probe");
        if right > idle {
            Ok(ActuatorState::Stopped)
        } else {
            Ok(ActuatorState::Opened)
        }
    }

    /// Discrete command: open from closed, close from open, pause while
    /// moving and resume from a pause in the opposite sense of the last move.
    pub fn toggle(&mut self) -> Result<ActuatorState> {
        let from = self.state;
        match self.state {
            ActuatorState::Closed => self.drive(Direction::Right, ActuatorState::Opening)?,
            ActuatorState::Opened => self.drive(Direction::Left, ActuatorState::Closing)?,
            ActuatorState::Opening | ActuatorState::Closing => {
                self.drive(Direction::Stop, ActuatorState::Stopped)?;
            }
            ActuatorState::Stopped => match self.previous {
                ActuatorState::Closing => self.drive(Direction::Right, ActuatorState::Opening)?,
                ActuatorState::Opening => self.drive(Direction::Left, ActuatorState::Closing)?,
                _ => self.recover()?,
            },
            ActuatorState::Unknown => self.recover()?,
        }
        debug!(actuator = self.name(), %from, to = %self.state, "toggle");
        Ok(self.state)
    }

    /// Analog stick sample in -100..=100, edge-triggered on the previous sample.
    pub fn set(&mut self, stick: i8) -> Result<ActuatorState> {
        self.previous = self.state;
        let last = self.last_position;
        if stick > 0 && last <= 0 {
            self.driver.act(Direction::Right)?;
            self.state = ActuatorState::Opening;
        } else if stick < 0 && last >= 0 {
            self.driver.act(Direction::Left)?;
            self.state = ActuatorState::Closing;
        } else if stick == 0 && last != 0 {
            self.driver.act(Direction::Stop)?;
            self.state = ActuatorState::Stopped;
        }
        self.last_position = stick;
        self.last_position_ms = self.clock.now_ms();
        Ok(self.state)
    }

    /// End motion once the filtered current shows the actuator is unloaded.
    pub fn periodic_current_check(&mut self) -> Result<()> {
        if !self.state.is_moving() {
            return Ok(());
        }
        let ma = self.driver.current_milliamps(true)?;
        if ma >= self.cfg.idle_current_ma {
            return Ok(());
        }
        let end = match self.state {
            ActuatorState::Closing => ActuatorState::Closed,
            _ => ActuatorState::Opened,
        };
        self.driver.act(Direction::Off)?;
        self.previous = self.state;
        self.state = end;
        self.last_position = STICK_NEUTRAL;
        info!(actuator = self.name(), ma, state = %end, "end of travel");
        Ok(())
    }

    /// Brake analog-driven motion whose stick stream went quiet at a partial deflection.
    pub fn periodic_input_staleness(&mut self, now: u32) -> Result<()> {
        if !self.cfg.stale_input_guard || !self.state.is_moving() {
            return Ok(());
        }
        if elapsed_ms(now, self.last_position_ms) <= self.cfg.stale_input_ms {
            return Ok(());
        }
        if matches!(
            self.last_position,
            STICK_FULL_CLOSE | STICK_NEUTRAL | STICK_FULL_OPEN
        ) {
            return Ok(());
        }
        warn!(
            actuator = self.name(),
            stick = self.last_position,
            "stick input stale; braking"
        );
        self.driver.act(Direction::Stop)?;
        self.previous = self.state;
        self.state = ActuatorState::Stopped;
        self.last_position = STICK_NEUTRAL;
        Ok(())
    }

    /// One scheduling pass: driver housekeeping, then the periodic sweeps.
    pub fn tick(&mut self, now: u32) -> Result<Option<DriverFault>> {
        let fault = self.driver.tick(now)?;
        if fault == Some(DriverFault::HardwareFault) && self.state.is_moving() {
            // The bridge is off mid-travel; without this the next current
            // check would read the dead motor as end of travel.
            self.previous = self.state;
            self.state = ActuatorState::Stopped;
        }
        if elapsed_ms(now, self.last_current_check_ms) > self.cfg.current_check_interval_ms {
            self.last_current_check_ms = now;
            self.periodic_current_check()?;
        }
        self.periodic_input_staleness(now)?;
        Ok(fault)
    }

    /// Switch the bridge off without touching the tracked state.
    pub fn power_off(&mut self) -> Result<()> {
        self.driver.act(Direction::Off)
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn previous_state(&self) -> ActuatorState {
        self.previous
    }

    pub fn last_position(&self) -> i8 {
        self.last_position
    }

    pub fn last_position_ms(&self) -> u32 {
        self.last_position_ms
    }

    pub fn driver(&self) -> &MotorDriver<O, I, A> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut MotorDriver<O, I, A> {
        &mut self.driver
    }

    fn drive(&mut self, direction: Direction, to: ActuatorState) -> Result<()> {
        self.driver.act(direction)?;
        self.previous = self.state;
        self.state = to;
        Ok(())
    }

    fn recover(&mut self) -> Result<()> {
        warn!(
            actuator = self.name(),
            state = %self.state,
            previous = %self.previous,
            "invalid state for toggle; braking"
        );
        self.driver.act(Direction::Stop)?;
        self.previous = ActuatorState::Opening;
        self.state = ActuatorState::Stopped;
        Ok(())
    }
}
