#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and command-script parsing for the body-control ECU.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The command-script CSV loader enforces headers and ordering; scripts
//!   stand in for the bus when running against the simulated plant.
use serde::Deserialize;

/// Pin assignment of one H-bridge channel.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Pins {
    /// BCM number of bridge input 1
    pub in1: u8,
    /// BCM number of bridge input 2
    pub in2: u8,
    /// BCM number of the bridge enable/sleep input
    pub enable: u8,
    /// BCM number of the active-low nFAULT output of the bridge
    pub fault: u8,
    /// Converter channel wired to the current-sense output
    pub current_channel: u8,
}

#[derive(Debug, Deserialize)]
pub struct ActuatorSection {
    pub pins: Pins,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DriverCfg {
    /// Converter reference voltage in microvolts
    pub ref_microvolts: u32,
    /// Current-sense load resistor in milliohms
    pub load_milliohms: u32,
    /// Longest a direction may be held before the driver brakes
    pub run_timeout_ms: u32,
    /// Minimum spacing between driver housekeeping passes
    pub tick_interval_ms: u32,
}

impl Default for DriverCfg {
    fn default() -> Self {
        Self {
            ref_microvolts: 3_324_000,
            load_milliohms: 2490,
            run_timeout_ms: 30_000,
            tick_interval_ms: 15,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorCfg {
    /// Below this current (mA) the actuator is considered unloaded
    pub idle_current_ma: u16,
    /// Settle time for each calibration probe
    pub settle_delay_ms: u32,
    /// Cadence of the end-of-travel current check
    pub current_check_interval_ms: u32,
    /// Analog stick stream considered stale after this long
    pub stale_input_ms: u32,
    /// Enable the stale-input cutoff for the analog set protocol
    pub stale_input_guard: bool,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            idle_current_ma: 100,
            settle_delay_ms: 50,
            current_check_interval_ms: 50,
            stale_input_ms: 400,
            stale_input_guard: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdcCfg {
    pub spi_bus: u8,
    pub slave_select: u8,
    pub clock_hz: u32,
    /// Max time to wait for one conversion
    pub conversion_timeout_ms: u64,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            slave_select: 0,
            clock_hz: 1_000_000,
            conversion_timeout_ms: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Sleep between scheduling-loop iterations
    pub period_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self { period_ms: 1 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StartPosition {
    #[default]
    Closed,
    Open,
    Middle,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    pub travel_ms: u32,
    pub running_raw: u16,
    pub idle_raw: u16,
    pub hood_start: StartPosition,
    pub trunk_start: StartPosition,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            travel_ms: 3000,
            running_raw: 1800,
            idle_raw: 20,
            hood_start: StartPosition::Closed,
            trunk_start: StartPosition::Closed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub hood: ActuatorSection,
    pub trunk: ActuatorSection,
    #[serde(default)]
    pub driver: DriverCfg,
    #[serde(default)]
    pub actuator: ActuatorCfg,
    #[serde(default)]
    pub adc: AdcCfg,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Driver
        if self.driver.ref_microvolts == 0 {
            eyre::bail!("driver.ref_microvolts must be > 0");
        }
        if self.driver.load_milliohms == 0 {
            eyre::bail!("driver.load_milliohms must be > 0");
        }
        if self.driver.run_timeout_ms == 0 {
            eyre::bail!("driver.run_timeout_ms must be >= 1");
        }
        if self.driver.tick_interval_ms == 0 {
            eyre::bail!("driver.tick_interval_ms must be >= 1");
        }

        // Actuator
        if self.actuator.settle_delay_ms == 0 {
            eyre::bail!("actuator.settle_delay_ms must be >= 1");
        }
        if self.actuator.settle_delay_ms > 5_000 {
            eyre::bail!("actuator.settle_delay_ms is unreasonably large (>5s)");
        }
        if self.actuator.current_check_interval_ms == 0 {
            eyre::bail!("actuator.current_check_interval_ms must be >= 1");
        }
        if self.actuator.stale_input_guard && self.actuator.stale_input_ms == 0 {
            eyre::bail!("actuator.stale_input_ms must be >= 1 when stale_input_guard is on");
        }

        // Pins
        let hood = self.hood.pins;
        let trunk = self.trunk.pins;
        let mut seen: Vec<u8> = Vec::with_capacity(8);
        for (name, p) in [("hood", hood), ("trunk", trunk)] {
            for pin in [p.in1, p.in2, p.enable, p.fault] {
                if pin > 27 {
                    eyre::bail!("{name}.pins: BCM pin {pin} out of range (0..=27)");
                }
                if seen.contains(&pin) {
                    eyre::bail!("{name}.pins: BCM pin {pin} assigned twice");
                }
                seen.push(pin);
            }
            if p.current_channel > 3 {
                eyre::bail!("{name}.pins.current_channel must be in 0..=3");
            }
        }
        if hood.current_channel == trunk.current_channel {
            eyre::bail!("hood and trunk must use different current_channel values");
        }

        // ADC
        if self.adc.clock_hz == 0 {
            eyre::bail!("adc.clock_hz must be > 0");
        }
        if self.adc.conversion_timeout_ms == 0 {
            eyre::bail!("adc.conversion_timeout_ms must be >= 1");
        }

        // Runner
        if self.runner.period_ms > 15 {
            eyre::bail!("runner.period_ms must be <= 15 to keep up with driver ticks");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {r:?}");
        }

        // Simulation
        if self.simulation.travel_ms == 0 {
            eyre::bail!("simulation.travel_ms must be >= 1");
        }
        if self.simulation.running_raw > 4095 || self.simulation.idle_raw > 4095 {
            eyre::bail!("simulation raw codes must be <= 4095");
        }

        Ok(())
    }
}

/// Which actuator a script row addresses.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTarget {
    Hood,
    Trunk,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScriptCommand {
    /// Analog stick sample; `value` in -100..=100
    Set,
    Toggle,
    /// Ask for the current state
    Request,
    /// Simulation only: assert (1) or release (0) the bridge fault line
    Fault,
}

/// Command-script CSV schema.
///
/// Expected headers:
/// at_ms,target,command,value
///
/// Example:
/// at_ms,target,command,value
/// 0,trunk,toggle,
/// 250,hood,set,60
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRow {
    /// Offset from loop start
    pub at_ms: u32,
    pub target: ScriptTarget,
    pub command: ScriptCommand,
    pub value: Option<i16>,
}

impl ScriptRow {
    fn check(&self, line: usize) -> eyre::Result<()> {
        match (self.command, self.value) {
            (ScriptCommand::Set, None) => {
                eyre::bail!("script line {line}: set requires a value")
            }
            (ScriptCommand::Set, Some(v)) if !(-100..=100).contains(&v) => {
                eyre::bail!("script line {line}: set value {v} outside -100..=100")
            }
            (ScriptCommand::Fault, Some(0 | 1)) => Ok(()),
            (ScriptCommand::Fault, _) => {
                eyre::bail!("script line {line}: fault value must be 0 or 1")
            }
            _ => Ok(()),
        }
    }
}

pub fn load_script_csv(path: &std::path::Path) -> eyre::Result<Vec<ScriptRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open command script {:?}: {}", path, e))?;
    parse_script(rdr)
}

/// Parse a command script from any reader (same rules as [`load_script_csv`]).
pub fn parse_script_str(s: &str) -> eyre::Result<Vec<ScriptRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(s.as_bytes());
    parse_script(rdr)
}

fn parse_script<R: std::io::Read>(mut rdr: csv::Reader<R>) -> eyre::Result<Vec<ScriptRow>> {
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read script headers: {}", e))?
        .clone();
    let expected = ["at_ms", "target", "command", "value"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "command script must have headers 'at_ms,target,command,value', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<ScriptRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<ScriptRow>().enumerate() {
        let line = idx + 2;
        let row = rec.map_err(|e| eyre::eyre!("invalid script row {}: {}", line, e))?;
        row.check(line)?;
        if let Some(prev) = rows.last()
            && row.at_ms < prev.at_ms
        {
            eyre::bail!(
                "script line {line}: at_ms {} goes backwards (previous {})",
                row.at_ms,
                prev.at_ms
            );
        }
        rows.push(row);
    }
    Ok(rows)
}
