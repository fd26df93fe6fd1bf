//! Simulated power supplies driving an ideal resistive load.
use labby_traits::{Device, DeviceType, HwResult, PowerSupply, PowerSupplyMode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{HwError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualArgs {
    pub load_in_ohms: f64,
}

impl VirtualArgs {
    fn validate(&self, driver: &str) -> Result<()> {
        if !(self.load_in_ohms.is_finite() && self.load_in_ohms > 0.0) {
            return Err(HwError::InvalidArgs {
                driver: driver.to_string(),
                message: format!("load_in_ohms must be > 0, got {}", self.load_in_ohms),
            });
        }
        Ok(())
    }
}

/// Ideal supply: regulates voltage until the load would draw more than the
/// current limit, then regulates current.
#[derive(Debug)]
pub struct VirtualPowerSupply {
    name: String,
    load_in_ohms: f64,
    output_on: bool,
    target_voltage: f64,
    target_current: f64,
}

impl VirtualPowerSupply {
    pub fn new(name: impl Into<String>, load_in_ohms: f64) -> Self {
        Self {
            name: name.into(),
            load_in_ohms,
            output_on: false,
            target_voltage: 0.0,
            target_current: 0.0,
        }
    }

    pub fn from_args(name: &str, args: VirtualArgs) -> Result<Self> {
        args.validate("virtual.PowerSupply")?;
        Ok(Self::new(name, args.load_in_ohms))
    }

    /// (voltage, current, mode) at the output terminals.
    fn operating_point(&self) -> (f64, f64, PowerSupplyMode) {
        if !self.output_on {
            return (0.0, 0.0, PowerSupplyMode::ConstantVoltage);
        }
        let cv_current = self.target_voltage / self.load_in_ohms;
        if cv_current <= self.target_current {
            (self.target_voltage, cv_current, PowerSupplyMode::ConstantVoltage)
        } else {
            (
                self.target_current * self.load_in_ohms,
                self.target_current,
                PowerSupplyMode::ConstantCurrent,
            )
        }
    }
}

impl Device for VirtualPowerSupply {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::PowerSupply
    }

    fn open(&mut self) -> HwResult<()> {
        debug!(device = %self.name, "virtual supply opened");
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        debug!(device = %self.name, "virtual supply closed");
        Ok(())
    }

    fn test_connection(&mut self) -> HwResult<()> {
        Ok(())
    }

    fn model(&mut self) -> HwResult<Option<String>> {
        Ok(Some(format!("VIRTUAL-{}OHM", self.load_in_ohms)))
    }

    fn as_power_supply(&mut self) -> Option<&mut dyn PowerSupply> {
        Some(self)
    }
}

impl PowerSupply for VirtualPowerSupply {
    fn get_mode(&mut self) -> HwResult<PowerSupplyMode> {
        Ok(self.operating_point().2)
    }

    fn is_output_on(&mut self) -> HwResult<bool> {
        Ok(self.output_on)
    }

    fn set_output_on(&mut self, is_on: bool) -> HwResult<()> {
        self.output_on = is_on;
        Ok(())
    }

    fn get_target_voltage(&mut self) -> HwResult<f64> {
        Ok(self.target_voltage)
    }

    fn get_actual_voltage(&mut self) -> HwResult<f64> {
        Ok(self.operating_point().0)
    }

    fn get_target_current(&mut self) -> HwResult<f64> {
        Ok(self.target_current)
    }

    fn get_actual_current(&mut self) -> HwResult<f64> {
        Ok(self.operating_point().1)
    }

    fn set_target_voltage(&mut self, voltage: f64) -> HwResult<()> {
        self.target_voltage = voltage;
        Ok(())
    }

    fn set_target_current(&mut self, current: f64) -> HwResult<()> {
        self.target_current = current;
        Ok(())
    }
}

/// A supply that never comes up; exercises the unavailable-device paths.
#[derive(Debug)]
pub struct BrokenPowerSupply {
    name: String,
}

impl BrokenPowerSupply {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn from_args(name: &str, args: VirtualArgs) -> Result<Self> {
        args.validate("virtual.BrokenPowerSupply")?;
        Ok(Self::new(name))
    }

    fn broken(&self) -> HwError {
        HwError::Connection(format!("{} does not respond", self.name))
    }
}

impl Device for BrokenPowerSupply {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::PowerSupply
    }

    fn open(&mut self) -> HwResult<()> {
        Err(self.broken().into())
    }

    fn close(&mut self) -> HwResult<()> {
        Ok(())
    }

    fn test_connection(&mut self) -> HwResult<()> {
        Err(self.broken().into())
    }

    fn as_power_supply(&mut self) -> Option<&mut dyn PowerSupply> {
        Some(self)
    }
}

impl PowerSupply for BrokenPowerSupply {
    fn get_mode(&mut self) -> HwResult<PowerSupplyMode> {
        Err(self.broken().into())
    }

    fn is_output_on(&mut self) -> HwResult<bool> {
        Err(self.broken().into())
    }

    fn set_output_on(&mut self, _is_on: bool) -> HwResult<()> {
        Err(self.broken().into())
    }

    fn get_target_voltage(&mut self) -> HwResult<f64> {
        Err(self.broken().into())
    }

    fn get_actual_voltage(&mut self) -> HwResult<f64> {
        Err(self.broken().into())
    }

    fn get_target_current(&mut self) -> HwResult<f64> {
        Err(self.broken().into())
    }

    fn get_actual_current(&mut self) -> HwResult<f64> {
        Err(self.broken().into())
    }

    fn set_target_voltage(&mut self, _voltage: f64) -> HwResult<()> {
        Err(self.broken().into())
    }

    fn set_target_current(&mut self, _current: f64) -> HwResult<()> {
        Err(self.broken().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn output_off_reads_zero() {
        let mut psu = VirtualPowerSupply::new("v", 5.0);
        psu.set_target_voltage(15.0).unwrap();
        psu.set_target_current(4.0).unwrap();
        assert_close(psu.get_actual_voltage().unwrap(), 0.0);
        assert_close(psu.get_actual_current().unwrap(), 0.0);
    }

    #[test]
    fn light_load_is_constant_voltage() {
        let mut psu = VirtualPowerSupply::new("v", 5.0);
        psu.set_target_voltage(15.0).unwrap();
        psu.set_target_current(4.0).unwrap();
        psu.set_output_on(true).unwrap();
        assert_close(psu.get_actual_voltage().unwrap(), 15.0);
        assert_close(psu.get_actual_current().unwrap(), 3.0);
        assert_eq!(psu.get_mode().unwrap(), PowerSupplyMode::ConstantVoltage);
    }

    #[test]
    fn heavy_load_is_constant_current() {
        let mut psu = VirtualPowerSupply::new("v", 2.0);
        psu.set_target_voltage(15.0).unwrap();
        psu.set_target_current(4.0).unwrap();
        psu.set_output_on(true).unwrap();
        assert_close(psu.get_actual_voltage().unwrap(), 8.0);
        assert_close(psu.get_actual_current().unwrap(), 4.0);
        assert_eq!(psu.get_mode().unwrap(), PowerSupplyMode::ConstantCurrent);
    }

    #[test]
    fn broken_supply_fails_open() {
        let mut psu = BrokenPowerSupply::new("b");
        let err = psu.open().unwrap_err();
        assert!(err.to_string().contains("does not respond"));
    }

    #[test]
    fn rejects_non_positive_load() {
        let err = VirtualPowerSupply::from_args("v", VirtualArgs { load_in_ohms: 0.0 }).unwrap_err();
        assert!(matches!(err, HwError::InvalidArgs { .. }));
    }
}
