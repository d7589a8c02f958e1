//! Human-readable error descriptions and structured JSON error formatting.

use ecu_core::error::{BuildError, EcuError};
use ecu_hardware::error::HwError;

/// Stable process exit codes.
pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_HARDWARE: i32 = 3;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid driver parameters ({msg}).\nLikely causes: Out-of-range values in [driver].\nHow to fix: Edit the config file, then rerun. See etc/ecu_config.toml for a sample."
        );
    }

    if let Some(e) = err.downcast_ref::<EcuError>() {
        return match e {
            EcuError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing [hood.pins]/[trunk.pins], a typo in a key, or an out-of-range value.\nHow to fix: Edit the TOML config (or the command script) and try again."
            ),
            EcuError::Timeout => "What happened: Current-sense conversion timed out.\nLikely causes: ADC not wired or powered, wrong SPI bus/slave select, or timeout too low.\nHow to fix: Check [adc] in the config, verify the converter supply, and raise adc.conversion_timeout_ms.".to_string(),
            EcuError::HardwareFault(msg) => format!(
                "What happened: The H-bridge reported a fault ({msg}).\nLikely causes: Over-current, over-temperature or undervoltage on the bridge.\nHow to fix: Check the actuator for a jam and the supply, then re-issue the command."
            ),
            EcuError::Hardware(msg) => format!(
                "What happened: A pin or converter operation failed ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO/SPI permissions.\nHow to fix: Fix the [hood.pins]/[trunk.pins] values; ensure the process may access /dev/gpiomem and /dev/spidev*."
            ),
            EcuError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return format!(
            "What happened: Failed to open hardware ({hw}).\nLikely causes: Not running on a Raspberry Pi, SPI disabled, or pins already claimed.\nHow to fix: Enable SPI, check the pin assignment, or run `ecu run --sim` to use the simulated actuators."
        );
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Config problems exit 2, hardware problems 3, everything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return EXIT_CONFIG;
    }
    if err.downcast_ref::<HwError>().is_some() {
        return EXIT_HARDWARE;
    }
    match err.downcast_ref::<EcuError>() {
        Some(EcuError::Config(_)) => EXIT_CONFIG,
        Some(EcuError::Hardware(_) | EcuError::HardwareFault(_) | EcuError::Timeout) => {
            EXIT_HARDWARE
        }
        _ => EXIT_GENERIC,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    if err.downcast_ref::<HwError>().is_some() {
        return "Hardware";
    }
    match err.downcast_ref::<EcuError>() {
        Some(EcuError::Config(_)) => "Config",
        Some(EcuError::Hardware(_)) => "Hardware",
        Some(EcuError::HardwareFault(_)) => "HardwareFault",
        Some(EcuError::Timeout) => "Timeout",
        Some(EcuError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;
    use rstest::rstest;

    fn wrapped(e: impl std::error::Error + Send + Sync + 'static) -> eyre::Report {
        Err::<(), _>(e).wrap_err("context").unwrap_err()
    }

    #[rstest]
    #[case(wrapped(EcuError::Config("x".into())), EXIT_CONFIG, "Config")]
    #[case(wrapped(BuildError::InvalidConfig("load")), EXIT_CONFIG, "Config")]
    #[case(wrapped(EcuError::Timeout), EXIT_HARDWARE, "Timeout")]
    #[case(wrapped(HwError::Gpio("pin 5".into())), EXIT_HARDWARE, "Hardware")]
    #[case(eyre::eyre!("boom"), EXIT_GENERIC, "Error")]
    fn codes_and_reasons(#[case] err: eyre::Report, #[case] code: i32, #[case] reason: &str) {
        assert_eq!(exit_code_for_error(&err), code);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], reason);
        assert_eq!(v["exit_code"], code);
    }

    #[test]
    fn config_errors_explain_the_fix() {
        let text = humanize(&wrapped(EcuError::Config("driver.load_milliohms must be > 0".into())));
        assert!(text.contains("load_milliohms"));
        assert!(text.contains("How to fix"));
    }
}
