#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Actuator control logic for the body-control ECU (hardware-agnostic).
//!
//! All hardware interactions go through the `ecu_traits` capability traits,
//! injected at construction.
//!
//! ## Architecture
//!
//! - **Filtering**: fixed-window moving average of motor current (`filter`)
//! - **Driver**: one H-bridge channel with fault and run-timeout cutoffs (`driver`)
//! - **Controller**: position state machine, toggle and analog set protocols (`controller`)
//! - **Bank**: the hood and trunk controllers side by side (`bank`)
//! - **Bus**: frame decoding and replies for the bus framework (`bus`)
//! - **Runner**: the cooperative scheduling loop (`runner`)
//!
//! ## Time
//!
//! Timestamps are `u32` milliseconds from [`ecu_traits::Clock::now_ms`] and
//! wrap. Intervals are always taken with [`util::elapsed_ms`].

pub mod bank;
pub mod bus;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod driver;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod status;
pub mod util;

pub use bank::{ActuatorBank, ActuatorId, BankFaults};
pub use config::{ActuatorCfg, DriverCfg};
pub use controller::ActuatorController;
pub use driver::{Direction, DriverPins, MotorDriver};
pub use error::{BuildError, DriverFault, EcuError};
pub use filter::{CurrentFilter, SampleFilter};
pub use runner::{RunEvent, RunSummary, Runner, ScriptAction, ScriptStep, Transition};
pub use status::ActuatorState;
