//! Hardware-facing traits shared by every labby crate.
//!
//! Drivers in `labby_hardware` implement these; `labby_core` only ever talks
//! to devices through them. Errors crossing this boundary are boxed so that
//! drivers can surface their own typed errors.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::error::Error;
use std::fmt;

/// Result type used at the trait boundary.
pub type HwResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Kind of lab hardware a driver controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    PowerSupply,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::PowerSupply => "power_supply",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regulation mode reported by a power supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSupplyMode {
    ConstantVoltage,
    ConstantCurrent,
}

impl PowerSupplyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerSupplyMode::ConstantVoltage => "constant_voltage",
            PowerSupplyMode::ConstantCurrent => "constant_current",
        }
    }
}

impl fmt::Display for PowerSupplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressable piece of lab hardware.
///
/// `open`/`close` bracket every session with the hardware. Capabilities are
/// exposed through the `as_*` accessors; a device that does not support a
/// capability returns `None`.
pub trait Device: Send {
    fn name(&self) -> &str;
    fn device_type(&self) -> DeviceType;
    fn open(&mut self) -> HwResult<()>;
    fn close(&mut self) -> HwResult<()>;
    /// Fails when the hardware does not answer.
    fn test_connection(&mut self) -> HwResult<()>;

    /// Model string reported by the hardware, if the device can report one.
    ///
    /// A `Some` reply proves the link as well as `test_connection` would.
    fn model(&mut self) -> HwResult<Option<String>> {
        Ok(None)
    }

    fn as_power_supply(&mut self) -> Option<&mut dyn PowerSupply> {
        None
    }

    fn as_passthrough(&mut self) -> Option<&mut dyn Passthrough> {
        None
    }
}

pub trait PowerSupply {
    fn get_mode(&mut self) -> HwResult<PowerSupplyMode>;
    fn is_output_on(&mut self) -> HwResult<bool>;
    fn set_output_on(&mut self, is_on: bool) -> HwResult<()>;
    fn get_target_voltage(&mut self) -> HwResult<f64>;
    fn get_actual_voltage(&mut self) -> HwResult<f64>;
    fn get_target_current(&mut self) -> HwResult<f64>;
    fn get_actual_current(&mut self) -> HwResult<f64>;
    fn set_target_voltage(&mut self, voltage: f64) -> HwResult<()>;
    fn set_target_current(&mut self, current: f64) -> HwResult<()>;
}

/// Raw access to a device speaking a line-based text protocol.
pub trait Passthrough {
    fn write_raw(&mut self, message: &str) -> HwResult<()>;
    fn query_raw(&mut self, message: &str) -> HwResult<String>;
}
