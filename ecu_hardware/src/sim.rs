//! Simulated linear actuator behind an H-bridge.
//!
//! The plant integrates its position over clock time from the bridge pin
//! levels it is driven with. Like a real trunk/hood actuator it has internal
//! limit switches: current flows only while it is actually travelling, and
//! drops to the idle level once the end of travel in the driven direction is
//! reached (or when the bridge is off/braked).
//!
//! Position is measured in milliseconds of travel: 0 is fully closed,
//! `travel_ms` is fully open. Driving "left" closes, driving "right" opens.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use ecu_traits::{AnalogInput, Clock, DigitalInput, DigitalOutput, HwResult};
use tracing::trace;

/// Where the simulated actuator sits at power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPosition {
    Closed,
    Open,
    Middle,
}

#[derive(Debug, Clone, Copy)]
pub struct SimActuatorCfg {
    /// Time for a full close-to-open stroke.
    pub travel_ms: u32,
    /// Raw ADC code reported while the motor is moving.
    pub running_raw: u16,
    /// Raw ADC code reported when idle or parked on a limit switch.
    pub idle_raw: u16,
    pub start: SimPosition,
}

impl Default for SimActuatorCfg {
    fn default() -> Self {
        Self {
            travel_ms: 3000,
            running_raw: 1800,
            idle_raw: 20,
            start: SimPosition::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Idle,
    Closing,
    Opening,
}

struct Plant {
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: SimActuatorCfg,
    in1: bool,
    in2: bool,
    enable: bool,
    position_ms: u32,
    last_update_ms: u32,
    fault: bool,
    calibrated: bool,
}

impl Plant {
    fn motion(&self) -> Motion {
        match (self.enable, self.in1, self.in2) {
            (true, false, true) => Motion::Closing,
            (true, true, false) => Motion::Opening,
            _ => Motion::Idle,
        }
    }

    /// Integrate position up to the current clock reading.
    fn update(&mut self) {
        let now = self.clock.now_ms();
        let dt = now.wrapping_sub(self.last_update_ms);
        self.last_update_ms = now;
        if self.fault {
            return;
        }
        match self.motion() {
            Motion::Closing => self.position_ms = self.position_ms.saturating_sub(dt),
            Motion::Opening => {
                self.position_ms = self.position_ms.saturating_add(dt).min(self.cfg.travel_ms);
            }
            Motion::Idle => {}
        }
    }

    fn travelling(&self) -> bool {
        if self.fault {
            return false;
        }
        match self.motion() {
            Motion::Closing => self.position_ms > 0,
            Motion::Opening => self.position_ms < self.cfg.travel_ms,
            Motion::Idle => false,
        }
    }

    fn current_raw(&self) -> u16 {
        if self.travelling() {
            self.cfg.running_raw
        } else {
            self.cfg.idle_raw
        }
    }
}

/// Which bridge input a [`SimPin`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    In1,
    In2,
    Enable,
}

/// Handle to one simulated actuator; hands out its pins.
#[derive(Clone)]
pub struct SimActuator {
    plant: Rc<RefCell<Plant>>,
}

impl SimActuator {
    pub fn new(cfg: SimActuatorCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let position_ms = match cfg.start {
            SimPosition::Closed => 0,
            SimPosition::Open => cfg.travel_ms,
            SimPosition::Middle => cfg.travel_ms / 2,
        };
        let last_update_ms = clock.now_ms();
        Self {
            plant: Rc::new(RefCell::new(Plant {
                clock,
                cfg,
                in1: false,
                in2: false,
                enable: false,
                position_ms,
                last_update_ms,
                fault: false,
                calibrated: false,
            })),
        }
    }

    pub fn in1(&self) -> SimPin {
        self.pin(Line::In1)
    }

    pub fn in2(&self) -> SimPin {
        self.pin(Line::In2)
    }

    pub fn enable(&self) -> SimPin {
        self.pin(Line::Enable)
    }

    fn pin(&self, line: Line) -> SimPin {
        SimPin {
            plant: Rc::clone(&self.plant),
            line,
        }
    }

    pub fn fault_line(&self) -> SimFault {
        SimFault {
            plant: Rc::clone(&self.plant),
        }
    }

    pub fn current_sense(&self) -> SimCurrent {
        SimCurrent {
            plant: Rc::clone(&self.plant),
        }
    }

    /// Assert (`true`) or release the driver fault. A faulted bridge stops moving.
    pub fn inject_fault(&self, asserted: bool) {
        let mut plant = self.plant.borrow_mut();
        plant.update();
        plant.fault = asserted;
    }

    /// Position in ms of travel from the closed end.
    pub fn position_ms(&self) -> u32 {
        let mut plant = self.plant.borrow_mut();
        plant.update();
        plant.position_ms
    }

    pub fn is_closed(&self) -> bool {
        self.position_ms() == 0
    }

    pub fn is_open(&self) -> bool {
        let travel = self.plant.borrow().cfg.travel_ms;
        self.position_ms() == travel
    }

    /// Bridge pin levels as (in1, in2, enable).
    pub fn bridge(&self) -> (bool, bool, bool) {
        let plant = self.plant.borrow();
        (plant.in1, plant.in2, plant.enable)
    }

    pub fn is_calibrated(&self) -> bool {
        self.plant.borrow().calibrated
    }
}

/// Simulated bridge input (IN1, IN2 or EN).
pub struct SimPin {
    plant: Rc<RefCell<Plant>>,
    line: Line,
}

impl DigitalOutput for SimPin {
    fn set_level(&mut self, high: bool) -> HwResult<()> {
        let mut plant = self.plant.borrow_mut();
        // Settle motion under the old levels before switching.
        plant.update();
        match self.line {
            Line::In1 => plant.in1 = high,
            Line::In2 => plant.in2 = high,
            Line::Enable => plant.enable = high,
        }
        Ok(())
    }
}

/// Simulated active-low nFAULT line.
pub struct SimFault {
    plant: Rc<RefCell<Plant>>,
}

impl DigitalInput for SimFault {
    fn is_high(&mut self) -> HwResult<bool> {
        Ok(!self.plant.borrow().fault)
    }
}

/// Simulated current-sense channel.
pub struct SimCurrent {
    plant: Rc<RefCell<Plant>>,
}

impl AnalogInput for SimCurrent {
    fn calibrate(&mut self) -> HwResult<()> {
        self.plant.borrow_mut().calibrated = true;
        Ok(())
    }

    fn read_raw(&mut self, _timeout: Duration) -> HwResult<u16> {
        let mut plant = self.plant.borrow_mut();
        plant.update();
        let raw = plant.current_raw();
        trace!(raw, position_ms = plant.position_ms, "sim current sample");
        Ok(raw)
    }
}
