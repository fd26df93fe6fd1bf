#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for labby.
//!
//! - `Config` lists the lab's devices and logging settings; it is
//!   deserialized from TOML and checked by `Config::validate`.
//! - `SequenceFile` describes an experiment sequence, one entry per run.
use std::collections::HashSet;
use std::path::Path;

use eyre::WrapErr;
use serde::Deserialize;

/// Device categories understood by the config loader.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    PowerSupply,
}

/// One `[[devices]]` entry.
///
/// Example:
/// [[devices]]
/// name = "bench-psu"
/// type = "power_supply"
/// driver = "tdklambda.ZUP"
/// [devices.args]
/// port = "/dev/ttyUSB0"
/// baudrate = 9600
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DeviceCfg {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Driver name as registered in the driver registry
    pub driver: String,
    /// Driver-specific arguments, typed by the driver itself
    #[serde(default)]
    pub args: toml::Table,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Experiments {
    /// Root directory for experiment CSV output
    pub output_dir: String,
}

impl Default for Experiments {
    fn default() -> Self {
        Self {
            output_dir: "output".into(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub devices: Vec<DeviceCfg>,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub experiments: Experiments,
}

pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
pub const LOG_ROTATIONS: [&str; 3] = ["never", "daily", "hourly"];

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn from_path(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read config {}", path.display()))?;
        let cfg = load_toml(&text)
            .map_err(|e| eyre::eyre!("invalid configuration in {}: {}", path.display(), e))?;
        cfg.validate()
            .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
        Ok(cfg)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceCfg> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Devices
        let mut seen = HashSet::new();
        for (i, dev) in self.devices.iter().enumerate() {
            if dev.name.trim().is_empty() {
                eyre::bail!("devices[{i}].name must not be empty");
            }
            if dev.name.trim() != dev.name {
                eyre::bail!("devices[{i}].name must not have surrounding whitespace");
            }
            if dev.driver.trim().is_empty() {
                eyre::bail!("devices[{i}].driver must not be empty");
            }
            if !seen.insert(dev.name.as_str()) {
                eyre::bail!("devices[{i}].name {:?} is used more than once", dev.name);
            }
        }

        // Logging
        if let Some(level) = &self.logging.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            eyre::bail!("logging.level must be one of {}", LOG_LEVELS.join("|"));
        }
        if let Some(rotation) = &self.logging.rotation
            && !LOG_ROTATIONS.contains(&rotation.to_ascii_lowercase().as_str())
        {
            eyre::bail!("logging.rotation must be one of {}", LOG_ROTATIONS.join("|"));
        }
        if let Some(file) = &self.logging.file
            && file.trim().is_empty()
        {
            eyre::bail!("logging.file must not be empty when set");
        }

        // Experiments
        if self.experiments.output_dir.trim().is_empty() {
            eyre::bail!("experiments.output_dir must not be empty");
        }

        Ok(())
    }
}

/// One `[[sequence]]` entry of a sequence file.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SequenceEntry {
    pub experiment_type: String,
    /// Experiment parameters, typed by the experiment factory
    #[serde(default)]
    pub params: toml::Table,
}

/// An experiment sequence.
///
/// Example:
/// [[sequence]]
/// experiment_type = "hold"
/// [sequence.params]
/// device = "bench-psu"
/// current_in_amps = 7
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceFile {
    pub sequence: Vec<SequenceEntry>,
}

pub fn load_sequence_toml(s: &str) -> eyre::Result<SequenceFile> {
    let file: SequenceFile =
        toml::from_str(s).map_err(|e| eyre::eyre!("invalid sequence file: {e}"))?;
    if file.sequence.is_empty() {
        eyre::bail!("sequence must contain at least one experiment");
    }
    for (i, entry) in file.sequence.iter().enumerate() {
        if entry.experiment_type.trim().is_empty() {
            eyre::bail!("sequence[{i}].experiment_type must not be empty");
        }
    }
    Ok(file)
}
