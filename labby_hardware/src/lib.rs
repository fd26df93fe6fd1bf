//! Drivers and transports for lab hardware.
//!
//! - `serial`: link abstraction, `SystemOpener` (feature `hardware`)
//! - `controller`: per-port worker threads shared through `PortRegistry`
//! - `tdklambda`: TDK-Lambda ZUP power supplies
//! - `virtual_psu`: simulated supplies for dry runs and tests
//! - `drivers`: name → constructor registry used by the config loader
pub mod controller;
pub mod drivers;
pub mod error;
pub mod mock;
pub mod serial;
pub mod tdklambda;
pub mod util;
pub mod virtual_psu;

pub use controller::{PortHandle, PortRegistry};
pub use drivers::DriverRegistry;
pub use error::HwError;
pub use serial::{Parity, SerialSettings};
