//! `DeviceController`: the single entry point for talking to configured devices.
//!
//! Every operation brackets its hardware access in an open/close session, so
//! ports are only held while a call is in flight.
use std::collections::HashSet;
use std::fmt;

use labby_hardware::HwError;
use labby_traits::{Device, DeviceType, HwResult};
use tracing::{debug, info, warn};

use crate::builder::DeviceControllerBuilder;
use crate::command::{Capability, Command, CommandOutcome};
use crate::error::{BuildError, LabbyError, Result};
use crate::hw_error::{error_type, lift};
use crate::status::{
    ConnectionState, DeviceAvailability, DeviceInfo, DeviceStatus, PowerSupplyInfo,
};

pub struct DeviceController {
    devices: Vec<Box<dyn Device>>,
}

impl fmt::Debug for DeviceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceController")
            .field("devices", &self.list_devices())
            .finish()
    }
}

/// Open `device`, run `f`, then close it.
///
/// Close runs even when `f` fails; the error from `f` takes precedence.
pub(crate) fn with_session<T>(
    device: &mut dyn Device,
    f: impl FnOnce(&mut dyn Device) -> HwResult<T>,
) -> HwResult<T> {
    device.open()?;
    debug!(device = device.name(), "session opened");
    let result = f(&mut *device);
    let closed = device.close();
    if let Err(e) = &closed {
        warn!(device = device.name(), error = %e, "close failed");
    }
    let value = result?;
    closed?;
    Ok(value)
}

fn read_info(device: &mut dyn Device) -> HwResult<DeviceInfo> {
    match device.device_type() {
        DeviceType::PowerSupply => {
            let psu = device
                .as_power_supply()
                .ok_or_else(|| HwError::Unsupported("power supply readings".into()))?;
            Ok(DeviceInfo::PowerSupply(PowerSupplyInfo {
                is_output_on: psu.is_output_on()?,
                mode: psu.get_mode()?,
                target_voltage: psu.get_target_voltage()?,
                target_current: psu.get_target_current()?,
                actual_voltage: psu.get_actual_voltage()?,
                actual_current: psu.get_actual_current()?,
            }))
        }
    }
}

fn execute(device: &mut dyn Device, command: &Command) -> HwResult<CommandOutcome> {
    let unsupported = || HwError::Unsupported(command.name().to_string());
    match command {
        Command::SetVoltage(v) => device
            .as_power_supply()
            .ok_or_else(unsupported)?
            .set_target_voltage(*v)?,
        Command::SetCurrent(a) => device
            .as_power_supply()
            .ok_or_else(unsupported)?
            .set_target_current(*a)?,
        Command::SetOutput(on) => device
            .as_power_supply()
            .ok_or_else(unsupported)?
            .set_output_on(*on)?,
        Command::Write(message) => device
            .as_passthrough()
            .ok_or_else(unsupported)?
            .write_raw(message)?,
        Command::Query(message) => {
            let reply = device
                .as_passthrough()
                .ok_or_else(unsupported)?
                .query_raw(message)?;
            return Ok(CommandOutcome::Response(reply));
        }
    }
    Ok(CommandOutcome::Done)
}

impl DeviceController {
    /// Wrap already constructed devices. Names must be unique.
    pub fn new(devices: Vec<Box<dyn Device>>) -> std::result::Result<Self, BuildError> {
        let mut seen = HashSet::new();
        for device in &devices {
            if !seen.insert(device.name().to_string()) {
                return Err(BuildError::DuplicateDevice(device.name().to_string()));
            }
        }
        Ok(Self { devices })
    }

    pub fn builder() -> DeviceControllerBuilder {
        DeviceControllerBuilder::default()
    }

    /// Configured device names, in configuration order.
    pub fn list_devices(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name().to_string()).collect()
    }

    pub(crate) fn device_mut(&mut self, id: &str) -> Result<&mut dyn Device> {
        match self.devices.iter_mut().find(|d| d.name() == id) {
            Some(device) => Ok(&mut **device),
            None => Err(LabbyError::DeviceNotFound(id.to_string())),
        }
    }

    /// Open, test and close every device.
    pub fn probe_devices(&mut self) -> Vec<DeviceAvailability> {
        self.devices
            .iter_mut()
            .map(|device| {
                let name = device.name().to_string();
                match with_session(&mut **device, |d| d.test_connection()) {
                    Ok(()) => {
                        debug!(device = %name, "available");
                        DeviceAvailability::available(&name)
                    }
                    Err(e) => {
                        info!(device = %name, error = %e, "unavailable");
                        DeviceAvailability::unavailable(&name, error_type(e.as_ref()), e.to_string())
                    }
                }
            })
            .collect()
    }

    /// Read the device's state. Communication failures are reported as
    /// `Disconnected`; only an unknown id is an error.
    pub fn get_status(&mut self, id: &str) -> Result<DeviceStatus> {
        let device = self.device_mut(id)?;
        let device_type = device.device_type();
        let outcome = with_session(device, |d| {
            let model = d.model()?;
            if model.is_none() {
                d.test_connection()?;
            }
            let info = read_info(d)?;
            Ok((model, info))
        });
        let (model, connection) = match outcome {
            Ok((model, info)) => (model, ConnectionState::Connected { info }),
            Err(e) => {
                warn!(device = id, error = %e, "status read failed");
                (
                    None,
                    ConnectionState::Disconnected {
                        error_type: error_type(e.as_ref()),
                        error_message: e.to_string(),
                    },
                )
            }
        };
        Ok(DeviceStatus {
            name: id.to_string(),
            device_type,
            model,
            connection,
        })
    }

    pub fn send_command(&mut self, id: &str, command: &Command) -> Result<CommandOutcome> {
        let device = self.device_mut(id)?;
        command.validate()?;
        let supported = match command.capability() {
            Capability::PowerSupply => device.as_power_supply().is_some(),
            Capability::Passthrough => device.as_passthrough().is_some(),
        };
        if !supported {
            return Err(LabbyError::UnsupportedCommand {
                device: id.to_string(),
                command: format!("{} ({} capability)", command.name(), command.capability()),
            });
        }
        info!(device = id, %command, "sending command");
        with_session(device, |d| execute(d, command)).map_err(lift(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::BareDevice;
    use labby_hardware::virtual_psu::VirtualPowerSupply;

    fn controller() -> (DeviceController, BareDevice) {
        let bare = BareDevice::new("bare");
        let devices: Vec<Box<dyn Device>> = vec![
            Box::new(VirtualPowerSupply::new("psu", 5.0)),
            Box::new(bare.clone()),
        ];
        (DeviceController::new(devices).unwrap(), bare)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let devices: Vec<Box<dyn Device>> = vec![
            Box::new(BareDevice::new("a")),
            Box::new(BareDevice::new("a")),
        ];
        assert_eq!(
            DeviceController::new(devices).unwrap_err(),
            BuildError::DuplicateDevice("a".into())
        );
    }

    #[test]
    fn session_closes_after_failure() {
        let (mut ctl, bare) = controller();
        bare.fail_with("no answer");
        let status = ctl.get_status("bare").unwrap();
        assert!(!status.is_connected());
        assert_eq!(bare.opens(), 1);
        assert_eq!(bare.closes(), 1);
    }

    #[test]
    fn command_without_capability_is_unsupported_and_never_opens() {
        let (mut ctl, bare) = controller();
        let err = ctl
            .send_command("bare", &Command::SetVoltage(1.0))
            .unwrap_err();
        assert!(matches!(err, LabbyError::UnsupportedCommand { .. }));
        assert_eq!(bare.opens(), 0);
    }

    #[test]
    fn unknown_id_wins_over_invalid_command() {
        let (mut ctl, _) = controller();
        assert_eq!(
            ctl.send_command("nope", &Command::SetVoltage(-1.0)),
            Err(LabbyError::DeviceNotFound("nope".into()))
        );
    }
}
