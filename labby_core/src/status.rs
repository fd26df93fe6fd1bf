//! Status snapshots returned by the controller.
use labby_traits::{DeviceType, PowerSupplyMode};
use serde::{Serialize, Serializer};

fn as_str_device_type<S: Serializer>(t: &DeviceType, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(t.as_str())
}

fn as_str_mode<S: Serializer>(m: &PowerSupplyMode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(m.as_str())
}

/// Readings taken from a power supply in one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerSupplyInfo {
    pub is_output_on: bool,
    #[serde(serialize_with = "as_str_mode")]
    pub mode: PowerSupplyMode,
    pub target_voltage: f64,
    pub target_current: f64,
    pub actual_voltage: f64,
    pub actual_current: f64,
}

/// Type-specific readings of a connected device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceInfo {
    PowerSupply(PowerSupplyInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Connected { info: DeviceInfo },
    Disconnected {
        error_type: String,
        error_message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub name: String,
    #[serde(serialize_with = "as_str_device_type")]
    pub device_type: DeviceType,
    pub model: Option<String>,
    pub connection: ConnectionState,
}

impl DeviceStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self.connection, ConnectionState::Connected { .. })
    }

    pub fn power_supply(&self) -> Option<&PowerSupplyInfo> {
        match &self.connection {
            ConnectionState::Connected {
                info: DeviceInfo::PowerSupply(info),
            } => Some(info),
            ConnectionState::Disconnected { .. } => None,
        }
    }
}

/// Result of probing one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceAvailability {
    pub name: String,
    pub is_available: bool,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl DeviceAvailability {
    pub fn available(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_available: true,
            error_type: None,
            error_message: None,
        }
    }

    pub fn unavailable(name: &str, error_type: String, error_message: String) -> Self {
        Self {
            name: name.to_string(),
            is_available: false,
            error_type: Some(error_type),
            error_message: Some(error_message),
        }
    }
}
