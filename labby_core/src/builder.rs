//! Assembles a `DeviceController` from config entries and a driver registry.

use labby_config::Config;
use labby_hardware::DriverRegistry;
use labby_traits::Device;
use tracing::debug;

use crate::controller::DeviceController;
use crate::conversions::device_type_of;
use crate::error::BuildError;

#[derive(Default)]
pub struct DeviceControllerBuilder {
    devices: Vec<Box<dyn Device>>,
}

impl DeviceControllerBuilder {
    /// Add an already constructed device.
    pub fn device(mut self, device: Box<dyn Device>) -> Self {
        self.devices.push(device);
        self
    }

    /// Create every `[[devices]]` entry through `drivers`, in config order.
    pub fn with_config(
        mut self,
        cfg: &Config,
        drivers: &DriverRegistry,
    ) -> Result<Self, BuildError> {
        for dev in &cfg.devices {
            let configured = device_type_of(dev.kind);
            let actual = drivers
                .device_type(&dev.driver)
                .ok_or_else(|| BuildError::Driver {
                    device: dev.name.clone(),
                    message: format!(
                        "unknown driver {:?} (known: {})",
                        dev.driver,
                        drivers.driver_names().collect::<Vec<_>>().join(", ")
                    ),
                })?;
            if actual != configured {
                return Err(BuildError::DeviceTypeMismatch {
                    device: dev.name.clone(),
                    driver: dev.driver.clone(),
                    configured: configured.to_string(),
                    actual: actual.to_string(),
                });
            }
            let device = drivers
                .create(&dev.name, &dev.driver, &dev.args)
                .map_err(|e| BuildError::Driver {
                    device: dev.name.clone(),
                    message: e.to_string(),
                })?;
            debug!(device = %dev.name, driver = %dev.driver, "device created");
            self.devices.push(device);
        }
        Ok(self)
    }

    pub fn try_build(self) -> Result<DeviceController, BuildError> {
        DeviceController::new(self.devices)
    }
}

impl DeviceController {
    /// Build a controller for every device in `cfg`.
    pub fn from_config(cfg: &Config, drivers: &DriverRegistry) -> Result<Self, BuildError> {
        DeviceController::builder()
            .with_config(cfg, drivers)?
            .try_build()
    }
}
