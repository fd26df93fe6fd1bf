//! Driver registry: maps a driver name from the config to a constructor.
use std::collections::BTreeMap;

use labby_traits::{Device, DeviceType};
use serde::de::DeserializeOwned;

use crate::controller::PortRegistry;
use crate::error::{HwError, Result};
use crate::tdklambda::Zup;
use crate::virtual_psu::{BrokenPowerSupply, VirtualPowerSupply};

pub const TDKLAMBDA_ZUP: &str = "tdklambda.ZUP";
pub const VIRTUAL_POWER_SUPPLY: &str = "virtual.PowerSupply";
pub const VIRTUAL_BROKEN_POWER_SUPPLY: &str = "virtual.BrokenPowerSupply";

/// Builds a device from its name, args table and the shared port registry.
pub type DriverFn = fn(&str, &toml::Table, &PortRegistry) -> Result<Box<dyn Device>>;

struct DriverEntry {
    device_type: DeviceType,
    build: DriverFn,
}

pub struct DriverRegistry {
    drivers: BTreeMap<String, DriverEntry>,
    ports: PortRegistry,
}

impl DriverRegistry {
    /// An empty registry; see `with_builtin`.
    pub fn new(ports: PortRegistry) -> Self {
        Self {
            drivers: BTreeMap::new(),
            ports,
        }
    }

    pub fn with_builtin(ports: PortRegistry) -> Self {
        let mut reg = Self::new(ports);
        reg.register(TDKLAMBDA_ZUP, DeviceType::PowerSupply, |name, args, ports| {
            let args = parse_args(TDKLAMBDA_ZUP, args)?;
            let device: Box<dyn Device> = Box::new(Zup::from_args(name, args, ports.clone())?);
            Ok(device)
        });
        reg.register(VIRTUAL_POWER_SUPPLY, DeviceType::PowerSupply, |name, args, _| {
            let args = parse_args(VIRTUAL_POWER_SUPPLY, args)?;
            let device: Box<dyn Device> = Box::new(VirtualPowerSupply::from_args(name, args)?);
            Ok(device)
        });
        reg.register(
            VIRTUAL_BROKEN_POWER_SUPPLY,
            DeviceType::PowerSupply,
            |name, args, _| {
                let args = parse_args(VIRTUAL_BROKEN_POWER_SUPPLY, args)?;
                let device: Box<dyn Device> = Box::new(BrokenPowerSupply::from_args(name, args)?);
                Ok(device)
            },
        );
        reg
    }

    pub fn register(&mut self, driver: &str, device_type: DeviceType, build: DriverFn) {
        self.drivers
            .insert(driver.to_string(), DriverEntry { device_type, build });
    }

    pub fn device_type(&self, driver: &str) -> Option<DeviceType> {
        self.drivers.get(driver).map(|d| d.device_type)
    }

    pub fn driver_names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str, driver: &str, args: &toml::Table) -> Result<Box<dyn Device>> {
        let entry = self
            .drivers
            .get(driver)
            .ok_or_else(|| HwError::UnknownDriver(driver.to_string()))?;
        let device = (entry.build)(name, args, &self.ports)?;
        tracing::debug!(device = name, driver, "device created");
        Ok(device)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin(PortRegistry::system())
    }
}

fn parse_args<T: DeserializeOwned>(driver: &str, args: &toml::Table) -> Result<T> {
    toml::Value::Table(args.clone())
        .try_into()
        .map_err(|e: toml::de::Error| HwError::InvalidArgs {
            driver: driver.to_string(),
            message: e.message().to_string(),
        })
}
