//! Actuator position state as tracked by a controller.

use std::fmt;

/// Believed position/motion of one actuator.
///
/// Discriminants are the codes reported on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ActuatorState {
    /// Not yet calibrated.
    #[default]
    Unknown = 0,
    /// Halted somewhere between the ends.
    Stopped = 1,
    Closing = 2,
    Closed = 3,
    Opening = 4,
    Opened = 5,
}

impl ActuatorState {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unknown,
            1 => Self::Stopped,
            2 => Self::Closing,
            3 => Self::Closed,
            4 => Self::Opening,
            5 => Self::Opened,
            _ => return None,
        })
    }

    /// True while the motor is expected to be driven.
    #[inline]
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Stopped => "stopped",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Opened => "opened",
        }
    }
}

impl fmt::Display for ActuatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ActuatorState::Unknown, 0)]
    #[case(ActuatorState::Stopped, 1)]
    #[case(ActuatorState::Closing, 2)]
    #[case(ActuatorState::Closed, 3)]
    #[case(ActuatorState::Opening, 4)]
    #[case(ActuatorState::Opened, 5)]
    fn wire_codes(#[case] state: ActuatorState, #[case] code: u8) {
        assert_eq!(state.code(), code);
        assert_eq!(ActuatorState::from_code(code), Some(state));
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(ActuatorState::from_code(6), None);
    }
}
