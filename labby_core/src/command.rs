//! Commands accepted by `DeviceController::send_command`.
//!
//! Text form is `key=value`: `voltage=4.25`, `current=1.2`, `output=on`,
//! `query=:MDL?;`, `write=:RMT1;`.
use std::fmt;
use std::str::FromStr;

use crate::error::LabbyError;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetVoltage(f64),
    SetCurrent(f64),
    SetOutput(bool),
    /// Raw text query; the reply line is returned.
    Query(String),
    /// Raw text write; no reply expected.
    Write(String),
}

/// Capability a device must expose to accept a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    PowerSupply,
    Passthrough,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::PowerSupply => "power supply",
            Capability::Passthrough => "raw passthrough",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    Response(String),
}

impl Command {
    pub fn capability(&self) -> Capability {
        match self {
            Command::SetVoltage(_) | Command::SetCurrent(_) | Command::SetOutput(_) => {
                Capability::PowerSupply
            }
            Command::Query(_) | Command::Write(_) => Capability::Passthrough,
        }
    }

    /// Short command name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetVoltage(_) => "voltage",
            Command::SetCurrent(_) => "current",
            Command::SetOutput(_) => "output",
            Command::Query(_) => "query",
            Command::Write(_) => "write",
        }
    }

    /// Reject values that must never reach hardware.
    pub fn validate(&self) -> Result<(), LabbyError> {
        match self {
            Command::SetVoltage(v) | Command::SetCurrent(v) if !(v.is_finite() && *v >= 0.0) => {
                Err(LabbyError::InvalidCommand(format!(
                    "{} must be a finite value >= 0, got {v}",
                    self.name()
                )))
            }
            Command::Query(m) | Command::Write(m) if m.trim().is_empty() => Err(
                LabbyError::InvalidCommand(format!("{} needs a message", self.name())),
            ),
            _ => Ok(()),
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_setpoint(key: &str, value: &str) -> Result<f64, LabbyError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| LabbyError::InvalidCommand(format!("{key}: not a number: {value:?}")))
}

impl FromStr for Command {
    type Err = LabbyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| LabbyError::InvalidCommand(format!("expected key=value, got {s:?}")))?;
        let command = match key.trim().to_ascii_lowercase().as_str() {
            "voltage" => Command::SetVoltage(parse_setpoint("voltage", value)?),
            "current" => Command::SetCurrent(parse_setpoint("current", value)?),
            "output" => Command::SetOutput(parse_switch(value.trim()).ok_or_else(|| {
                LabbyError::InvalidCommand(format!("output: expected on|off, got {value:?}"))
            })?),
            "query" => Command::Query(value.to_string()),
            "write" => Command::Write(value.to_string()),
            other => {
                return Err(LabbyError::InvalidCommand(format!(
                    "unknown command {other:?} (expected voltage|current|output|query|write)"
                )));
            }
        };
        command.validate()?;
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetVoltage(v) => write!(f, "voltage={v}"),
            Command::SetCurrent(a) => write!(f, "current={a}"),
            Command::SetOutput(on) => write!(f, "output={}", if *on { "on" } else { "off" }),
            Command::Query(m) => write!(f, "query={m}"),
            Command::Write(m) => write!(f, "write={m}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_keeps_equals_signs_in_message() {
        let cmd: Command = "query=:A=B?;".parse().unwrap();
        assert_eq!(cmd, Command::Query(":A=B?;".into()));
    }

    #[test]
    fn negative_setpoint_is_invalid() {
        assert!(matches!(
            "voltage=-1".parse::<Command>(),
            Err(LabbyError::InvalidCommand(_))
        ));
    }

    #[test]
    fn capability_follows_command() {
        assert_eq!(Command::SetOutput(true).capability(), Capability::PowerSupply);
        assert_eq!(Command::Write("x".into()).capability(), Capability::Passthrough);
    }
}
