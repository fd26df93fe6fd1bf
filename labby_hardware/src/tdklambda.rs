//! TDK-Lambda ZUP series programmable power supplies.
//!
//! ASCII protocol over RS-232/RS-485: every command is `:<CMD><ARG>;`, queries
//! answer with a two-letter prefix followed by the value (`AV1.33`). Several
//! supplies can share a bus; `:ADRnn;` selects the one we talk to.
use std::time::Duration;

use labby_traits::{Device, DeviceType, HwResult, Passthrough, PowerSupply, PowerSupplyMode};
use serde::Deserialize;
use tracing::info;

use crate::controller::{PortHandle, PortRegistry};
use crate::error::{HwError, Result};
use crate::serial::{Parity, SerialSettings};
use crate::util::parse_prefixed;

/// Driver arguments as they appear under `[devices.args]`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZupArgs {
    pub port: String,
    pub baudrate: u32,
    #[serde(default = "default_address")]
    pub address: u8,
}

fn default_address() -> u8 {
    1
}

pub struct Zup {
    name: String,
    settings: SerialSettings,
    address: u8,
    registry: PortRegistry,
    handle: Option<PortHandle>,
}

impl Zup {
    pub const READ_TIMEOUT: Duration = Duration::from_secs(2);
    pub const WRITE_DELAY: Duration = Duration::from_millis(10);
    /// Addresses go out as two decimal digits.
    pub const MAX_ADDRESS: u8 = 99;

    pub fn new(
        name: impl Into<String>,
        port: impl Into<String>,
        baud_rate: u32,
        address: u8,
        registry: PortRegistry,
    ) -> Self {
        let mut settings = SerialSettings::new(port, baud_rate);
        settings.data_bits = 8;
        settings.parity = Parity::None;
        settings.stop_bits = 1;
        settings.xonxoff = true;
        settings.timeout = Self::READ_TIMEOUT;
        settings.write_delay = Self::WRITE_DELAY;
        Self {
            name: name.into(),
            settings,
            address,
            registry,
            handle: None,
        }
    }

    pub fn from_args(name: &str, args: ZupArgs, registry: PortRegistry) -> Result<Self> {
        if args.address > Self::MAX_ADDRESS {
            return Err(HwError::InvalidArgs {
                driver: "tdklambda.ZUP".into(),
                message: format!("address must be in 0..={}, got {}", Self::MAX_ADDRESS, args.address),
            });
        }
        Ok(Self::new(name, args.port, args.baudrate, args.address, registry))
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    fn port(&self) -> Result<&PortHandle> {
        self.handle.as_ref().ok_or(HwError::NotOpen)
    }

    fn write(&self, command: &str) -> Result<()> {
        self.port()?.write(format!(":{command};").as_bytes())
    }

    fn query(&self, command: &str) -> Result<String> {
        self.port()?.query(format!(":{command};").as_bytes())
    }

    fn query_value(&self, command: &str, prefix: &str) -> Result<f64> {
        let response = self.query(command)?;
        parse_prefixed(&format!(":{command};"), &response, prefix)
    }

    pub fn get_model(&self) -> Result<String> {
        self.query("MDL?")
    }

    pub fn get_software_version(&self) -> Result<String> {
        self.query("REV?")
    }

    fn mode(&self) -> Result<PowerSupplyMode> {
        let response = self.query("STA?")?;
        let invalid = || HwError::InvalidResponse {
            query: ":STA?;".into(),
            response: response.clone(),
        };
        match response.strip_prefix("OS").and_then(|bits| bits.chars().next()) {
            Some('1') => Ok(PowerSupplyMode::ConstantCurrent),
            Some('0') => Ok(PowerSupplyMode::ConstantVoltage),
            _ => Err(invalid()),
        }
    }

    fn output_on(&self) -> Result<bool> {
        let response = self.query("OUT?")?;
        match response.as_str() {
            "OT1" => Ok(true),
            "OT0" => Ok(false),
            _ => Err(HwError::InvalidResponse {
                query: ":OUT?;".into(),
                response,
            }),
        }
    }
}

impl Device for Zup {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::PowerSupply
    }

    fn open(&mut self) -> HwResult<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        self.handle = Some(self.registry.acquire(&self.settings)?);
        if let Err(e) = self.write(&format!("ADR{:02}", self.address)) {
            self.handle = None;
            return Err(e.into());
        }
        info!(device = %self.name, port = %self.settings.port, address = self.address, "ZUP opened");
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        if self.handle.take().is_some() {
            info!(device = %self.name, "ZUP closed");
        }
        Ok(())
    }

    fn test_connection(&mut self) -> HwResult<()> {
        self.model().map(|_| ())
    }

    fn model(&mut self) -> HwResult<Option<String>> {
        let model = self.get_model()?;
        if model.trim().is_empty() {
            return Err(HwError::Connection(format!("{}: empty model response", self.name)).into());
        }
        Ok(Some(model))
    }

    fn as_power_supply(&mut self) -> Option<&mut dyn PowerSupply> {
        Some(self)
    }

    fn as_passthrough(&mut self) -> Option<&mut dyn Passthrough> {
        Some(self)
    }
}

impl PowerSupply for Zup {
    fn get_mode(&mut self) -> HwResult<PowerSupplyMode> {
        Ok(self.mode()?)
    }

    fn is_output_on(&mut self) -> HwResult<bool> {
        Ok(self.output_on()?)
    }

    fn set_output_on(&mut self, is_on: bool) -> HwResult<()> {
        Ok(self.write(if is_on { "OUT1" } else { "OUT0" })?)
    }

    fn get_target_voltage(&mut self) -> HwResult<f64> {
        Ok(self.query_value("VOL!", "SV")?)
    }

    fn get_actual_voltage(&mut self) -> HwResult<f64> {
        Ok(self.query_value("VOL?", "AV")?)
    }

    fn get_target_current(&mut self) -> HwResult<f64> {
        Ok(self.query_value("CUR!", "SA")?)
    }

    fn get_actual_current(&mut self) -> HwResult<f64> {
        Ok(self.query_value("CUR?", "AA")?)
    }

    fn set_target_voltage(&mut self, voltage: f64) -> HwResult<()> {
        Ok(self.write(&format!("VOL{voltage:.3}"))?)
    }

    fn set_target_current(&mut self, current: f64) -> HwResult<()> {
        Ok(self.write(&format!("CUR{current:06.2}"))?)
    }
}

impl Passthrough for Zup {
    fn write_raw(&mut self, message: &str) -> HwResult<()> {
        Ok(self.port()?.write(message.as_bytes())?)
    }

    fn query_raw(&mut self, message: &str) -> HwResult<String> {
        Ok(self.port()?.query(message.as_bytes())?)
    }
}
