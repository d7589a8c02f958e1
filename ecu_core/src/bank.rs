//! The two actuators of the body controller.

use std::fmt;

use ecu_traits::{AnalogInput, DigitalInput, DigitalOutput};
use eyre::WrapErr;

use crate::controller::ActuatorController;
use crate::error::{DriverFault, Result};
use crate::status::ActuatorState;

/// Which actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorId {
    Hood,
    Trunk,
}

impl ActuatorId {
    pub const ALL: [Self; 2] = [Self::Hood, Self::Trunk];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hood => "hood",
            Self::Trunk => "trunk",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Faults raised by one [`ActuatorBank::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BankFaults {
    pub hood: Option<DriverFault>,
    pub trunk: Option<DriverFault>,
}

impl BankFaults {
    pub fn iter(&self) -> impl Iterator<Item = (ActuatorId, DriverFault)> + '_ {
        [(ActuatorId::Hood, self.hood), (ActuatorId::Trunk, self.trunk)]
            .into_iter()
            .filter_map(|(id, f)| f.map(|f| (id, f)))
    }

    pub fn is_empty(&self) -> bool {
        self.hood.is_none() && self.trunk.is_none()
    }
}

/// Hood and trunk controllers; they share nothing but the tick cadence.
pub struct ActuatorBank<O, I, A> {
    hood: ActuatorController<O, I, A>,
    trunk: ActuatorController<O, I, A>,
}

impl<O, I, A> fmt::Debug for ActuatorBank<O, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActuatorBank")
            .field("hood", &self.hood)
            .field("trunk", &self.trunk)
            .finish()
    }
}

impl<O, I, A> ActuatorBank<O, I, A>
where
    O: DigitalOutput,
    I: DigitalInput,
    A: AnalogInput,
{
    pub fn new(hood: ActuatorController<O, I, A>, trunk: ActuatorController<O, I, A>) -> Self {
        Self { hood, trunk }
    }

    pub fn init(&mut self) -> Result<()> {
        for id in ActuatorId::ALL {
            self.get_mut(id)
                .init()
                .wrap_err_with(|| format!("init {id}"))?;
        }
        Ok(())
    }

    /// Calibrate hood, then trunk. Returns their starting states.
    pub fn calibrate(&mut self) -> Result<(ActuatorState, ActuatorState)> {
        let hood = self.hood.calibrate()?;
        let trunk = self.trunk.calibrate()?;
        Ok((hood, trunk))
    }

    pub fn tick(&mut self, now: u32) -> Result<BankFaults> {
        Ok(BankFaults {
            hood: self.hood.tick(now)?,
            trunk: self.trunk.tick(now)?,
        })
    }

    /// De-energize both bridges. Both are attempted even if the first fails.
    pub fn power_off(&mut self) -> Result<()> {
        let hood = self.hood.power_off();
        let trunk = self.trunk.power_off();
        hood.wrap_err("power off hood")?;
        trunk.wrap_err("power off trunk")?;
        Ok(())
    }

    pub fn get(&self, id: ActuatorId) -> &ActuatorController<O, I, A> {
        match id {
            ActuatorId::Hood => &self.hood,
            ActuatorId::Trunk => &self.trunk,
        }
    }

    pub fn get_mut(&mut self, id: ActuatorId) -> &mut ActuatorController<O, I, A> {
        match id {
            ActuatorId::Hood => &mut self.hood,
            ActuatorId::Trunk => &mut self.trunk,
        }
    }

    /// (hood, trunk) states.
    pub fn states(&self) -> (ActuatorState, ActuatorState) {
        (self.hood.state(), self.trunk.state())
    }
}
