//! Maps `Box<dyn Error>` from trait boundaries to typed `EcuError`.
//!
//! The traits in `ecu_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `ecu_hardware::HwError` downcasting.

use crate::error::EcuError;

/// Map a trait-boundary error to a typed `EcuError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> EcuError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<ecu_hardware::error::HwError>() {
            return match hw {
                ecu_hardware::error::HwError::Timeout => EcuError::Timeout,
                other => EcuError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        EcuError::Timeout
    } else {
        EcuError::Hardware(s)
    }
}

/// Convert a boxed trait-boundary error into a report carrying the typed error.
pub(crate) fn report(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
