#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core device control (hardware-agnostic).
//!
//! All hardware access goes through the `labby_traits` device traits; drivers
//! live in `labby_hardware` and are selected by name from the config.
//!
//! ## Architecture
//!
//! - **Controller**: `DeviceController` lists, probes, reads and commands devices
//! - **Commands**: `Command` parsed from `key=value` text
//! - **Status**: `DeviceStatus` / `DeviceAvailability` snapshots
//! - **Experiments**: timed measurement sequences written to CSV
//!
//! Every controller call opens the device, does its work and closes it again,
//! so a port is only held while a call is in flight.

pub mod builder;
pub mod command;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod experiment;
pub mod hw_error;
pub mod mocks;
pub mod status;
pub mod util;

pub use builder::DeviceControllerBuilder;
pub use command::{Capability, Command, CommandOutcome};
pub use controller::DeviceController;
pub use error::{BuildError, LabbyError, Result};
pub use experiment::runner::{ExperimentReport, RunOptions, run_sequence};
pub use experiment::sequence::ExperimentSequence;
pub use experiment::{Experiment, ExperimentContext, ExperimentRegistry};
pub use status::{ConnectionState, DeviceAvailability, DeviceInfo, DeviceStatus, PowerSupplyInfo};
