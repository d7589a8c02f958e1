//! Adapter between decoded bus frames and the actuator bank.
//!
//! The bus framework delivers one [`Frame`] per received message and expects
//! a [`HandlerResult`] back: nothing to send, an error descriptor, or a reply
//! frame. Hardware faults raised by the drivers leave through the same error
//! descriptor via [`FaultReports`].

use ecu_traits::{AnalogInput, DigitalInput, DigitalOutput};
use tracing::{debug, warn};

use crate::bank::{ActuatorBank, BankFaults};
use crate::error::{DriverFault, Result};

pub use crate::bank::ActuatorId;

/// Payload capacity of one frame.
pub const FRAME_CAPACITY: usize = 8;

/// Set on the function id of every reply frame.
pub const REPLY_FLAG: u8 = 0x80;

pub const HOOD_OBJECT_ID: u16 = 0x0185;
pub const TRUNK_OBJECT_ID: u16 = 0x0184;

impl ActuatorId {
    pub fn object_id(self) -> u16 {
        match self {
            Self::Hood => HOOD_OBJECT_ID,
            Self::Trunk => TRUNK_OBJECT_ID,
        }
    }

    pub fn from_object_id(id: u16) -> Option<Self> {
        match id {
            HOOD_OBJECT_ID => Some(Self::Hood),
            TRUNK_OBJECT_ID => Some(Self::Trunk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionId {
    /// Report the current state.
    Request = 0x01,
    /// Analog stick sample, one signed byte.
    Set = 0x02,
    Toggle = 0x03,
}

impl TryFrom<u8> for FunctionId {
    type Error = BusError;

    fn try_from(v: u8) -> std::result::Result<Self, BusError> {
        match v {
            0x01 => Ok(Self::Request),
            0x02 => Ok(Self::Set),
            0x03 => Ok(Self::Toggle),
            _ => Err(BusError::request(RequestError::UnknownFunction)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub object_id: u16,
    pub function: u8,
    pub data: [u8; FRAME_CAPACITY],
    pub len: u8,
}

impl Frame {
    /// Build a frame; payload beyond [`FRAME_CAPACITY`] is dropped.
    pub fn new(object_id: u16, function: u8, payload: &[u8]) -> Self {
        let len = payload.len().min(FRAME_CAPACITY);
        let mut data = [0; FRAME_CAPACITY];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            object_id,
            function,
            data,
            len: len as u8,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len).min(FRAME_CAPACITY)]
    }

    pub fn set(id: ActuatorId, stick: i8) -> Self {
        Self::new(id.object_id(), FunctionId::Set as u8, &stick.to_le_bytes())
    }

    pub fn toggle(id: ActuatorId) -> Self {
        Self::new(id.object_id(), FunctionId::Toggle as u8, &[])
    }

    pub fn request(id: ActuatorId) -> Self {
        Self::new(id.object_id(), FunctionId::Request as u8, &[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Set(i8),
    Toggle,
    Request,
}

impl Command {
    pub fn decode(frame: &Frame) -> std::result::Result<Self, BusError> {
        let function = FunctionId::try_from(frame.function)?;
        match function {
            FunctionId::Request => Ok(Self::Request),
            FunctionId::Toggle => Ok(Self::Toggle),
            FunctionId::Set => {
                let &[byte, ..] = frame.payload() else {
                    return Err(BusError::request(RequestError::BadLength));
                };
                let stick = i8::from_le_bytes([byte]);
                if !(-100..=100).contains(&stick) {
                    return Err(BusError::request(RequestError::BadValue));
                }
                Ok(Self::Set(stick))
            }
        }
    }
}

/// Part of the device an error descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorSection {
    Request = 0x01,
    Hardware = 0x02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestError {
    UnknownObject = 0x01,
    UnknownFunction = 0x02,
    BadLength = 0x03,
    BadValue = 0x04,
}

/// Error descriptor handed back to the bus framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusError {
    pub section: ErrorSection,
    pub code: u8,
}

impl BusError {
    pub fn request(e: RequestError) -> Self {
        Self {
            section: ErrorSection::Request,
            code: e as u8,
        }
    }

    pub fn hardware(fault: DriverFault) -> Self {
        Self {
            section: ErrorSection::Hardware,
            code: fault.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    Ignore,
    Error(BusError),
    SendFrame(Frame),
}

/// Dispatch one received frame to the addressed actuator.
///
/// Malformed frames come back as [`HandlerResult::Error`]; `Err` is reserved
/// for pin or converter failures while acting on a valid command.
pub fn handle_frame<O, I, A>(
    bank: &mut ActuatorBank<O, I, A>,
    frame: &Frame,
) -> Result<HandlerResult>
where
    O: DigitalOutput,
    I: DigitalInput,
    A: AnalogInput,
{
    let Some(id) = ActuatorId::from_object_id(frame.object_id) else {
        debug!(object_id = frame.object_id, "frame for unknown object");
        return Ok(HandlerResult::Error(BusError::request(RequestError::UnknownObject)));
    };
    let command = match Command::decode(frame) {
        Ok(c) => c,
        Err(e) => {
            debug!(actuator = %id, function = frame.function, code = e.code, "rejected frame");
            return Ok(HandlerResult::Error(e));
        }
    };

    let ctl = bank.get_mut(id);
    let reply_fn = frame.function | REPLY_FLAG;
    let reply = match command {
        Command::Set(stick) => {
            ctl.set(stick)?;
            Frame::new(id.object_id(), reply_fn, &stick.to_le_bytes())
        }
        Command::Toggle => {
            let state = ctl.toggle()?;
            Frame::new(id.object_id(), reply_fn, &[state.code()])
        }
        Command::Request => Frame::new(id.object_id(), reply_fn, &[ctl.state().code()]),
    };
    Ok(HandlerResult::SendFrame(reply))
}

/// Hardware faults waiting to be reported on the bus, one slot per actuator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultReports {
    hood: Option<DriverFault>,
    trunk: Option<DriverFault>,
}

impl FaultReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep hardware faults from a bank tick; run timeouts are corrected
    /// locally and only logged.
    pub fn record(&mut self, faults: &BankFaults) {
        for (id, fault) in faults.iter() {
            match fault {
                DriverFault::HardwareFault => *self.slot(id) = Some(fault),
                DriverFault::ActionTimeout => {
                    warn!(actuator = %id, code = fault.code(), "run timeout corrected");
                }
            }
        }
    }

    /// Drain the pending fault of `id` into an error descriptor.
    pub fn take_fault_report(&mut self, id: ActuatorId) -> HandlerResult {
        match self.slot(id).take() {
            Some(fault) => HandlerResult::Error(BusError::hardware(fault)),
            None => HandlerResult::Ignore,
        }
    }

    fn slot(&mut self, id: ActuatorId) -> &mut Option<DriverFault> {
        match id {
            ActuatorId::Hood => &mut self.hood,
            ActuatorId::Trunk => &mut self.trunk,
        }
    }
}
