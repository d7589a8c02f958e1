//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ecu", version, about = "Hood and trunk actuator controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/ecu_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate both actuators and run the control loop
    Run {
        /// Command script CSV (at_ms,target,command,value) fed in place of the bus
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
        /// Stop after this many milliseconds (default: until Ctrl-C)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u32>,
        /// Run the simulation on a virtual clock instead of wall time
        #[arg(long, action = ArgAction::SetTrue, requires = "duration_ms")]
        virtual_time: bool,
        /// Use the simulated actuators even in a hardware build
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and calls mlockall(MCL_CURRENT|MCL_FUTURE) to keep the control loop resident in RAM. Failures are logged as warnings and the loop continues at normal priority. May require CAP_SYS_NICE / CAP_IPC_LOCK or root."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (1..=99); ignored without --rt
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
    },
    /// Bring up both drivers and read one current sample from each
    SelfCheck {
        /// Use the simulated actuators even in a hardware build
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
    },
}
