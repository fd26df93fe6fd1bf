//! Timed measurement experiments.
//!
//! An experiment sets up devices in `start`, returns one row of readings per
//! `measure` call and restores the hardware in `stop`. The runner in
//! [`runner`] handles pacing, CSV output and shutdown.
pub mod builtin;
pub mod runner;
pub mod sequence;

use std::collections::BTreeMap;
use std::time::Duration;

use labby_traits::PowerSupply;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::controller::DeviceController;
use crate::error::{LabbyError, Result};
use crate::hw_error::lift;

pub trait Experiment {
    fn experiment_type(&self) -> &str;
    fn sampling_rate_hz(&self) -> f64;
    fn duration(&self) -> Duration;
    /// Output columns, excluding the leading `seconds` column.
    fn columns(&self) -> Vec<String>;
    fn start(&mut self, ctx: &mut ExperimentContext<'_>) -> Result<()>;
    /// One row of readings taken `elapsed` after start; one value per column.
    fn measure(&mut self, ctx: &mut ExperimentContext<'_>, elapsed: Duration) -> Result<Vec<f64>>;
    fn stop(&mut self, ctx: &mut ExperimentContext<'_>) -> Result<()>;
}

/// Device access for a running experiment.
///
/// Devices are opened on first use and stay open until [`close_all`] so that
/// an experiment does not reopen the port on every sample.
///
/// [`close_all`]: ExperimentContext::close_all
pub struct ExperimentContext<'a> {
    controller: &'a mut DeviceController,
    opened: Vec<String>,
}

impl<'a> ExperimentContext<'a> {
    pub fn new(controller: &'a mut DeviceController) -> Self {
        Self {
            controller,
            opened: Vec::new(),
        }
    }

    fn ensure_open(&mut self, name: &str) -> Result<()> {
        if self.opened.iter().any(|n| n == name) {
            return Ok(());
        }
        let device = self.controller.device_mut(name)?;
        device.open().map_err(lift(name))?;
        info!(device = name, "opened for experiment");
        self.opened.push(name.to_string());
        Ok(())
    }

    pub fn power_supply(&mut self, name: &str) -> Result<&mut dyn PowerSupply> {
        self.ensure_open(name)?;
        let device = self.controller.device_mut(name)?;
        device
            .as_power_supply()
            .ok_or_else(|| LabbyError::UnsupportedCommand {
                device: name.to_string(),
                command: "power supply access".into(),
            })
    }

    /// Close every device opened through this context, newest first.
    pub fn close_all(&mut self) {
        while let Some(name) = self.opened.pop() {
            match self.controller.device_mut(&name) {
                Ok(device) => {
                    if let Err(e) = device.close() {
                        warn!(device = %name, error = %e, "close failed");
                    }
                }
                Err(e) => warn!(device = %name, error = %e, "close skipped"),
            }
        }
    }
}

impl Drop for ExperimentContext<'_> {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Build an experiment from its params table.
pub type ExperimentFactory = fn(&toml::Table) -> Result<Box<dyn Experiment>>;

/// Deserialize an experiment's params with serde defaults applied.
pub fn parse_params<T: DeserializeOwned>(experiment_type: &str, params: &toml::Table) -> Result<T> {
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|e| LabbyError::Experiment(format!("{experiment_type}: {e}")))
}

/// Upper bound on `duration * rate`; keeps every sample index exact in an `f64`.
const MAX_SAMPLES: f64 = (1u64 << 53) as f64;

/// Check the pacing parameters shared by every built-in experiment.
pub fn check_timing(experiment_type: &str, rate_hz: f64, duration_s: f64) -> Result<()> {
    if !(rate_hz.is_finite() && rate_hz > 0.0) {
        return Err(LabbyError::Experiment(format!(
            "{experiment_type}: sampling_rate_hz must be > 0, got {rate_hz}"
        )));
    }
    if !(duration_s.is_finite() && duration_s >= 0.0) {
        return Err(LabbyError::Experiment(format!(
            "{experiment_type}: duration_in_seconds must be >= 0, got {duration_s}"
        )));
    }
    if Duration::try_from_secs_f64(duration_s).is_err() {
        return Err(LabbyError::Experiment(format!(
            "{experiment_type}: duration_in_seconds is too large, got {duration_s}"
        )));
    }
    if duration_s * rate_hz >= MAX_SAMPLES {
        return Err(LabbyError::Experiment(format!(
            "{experiment_type}: {duration_s} s at {rate_hz} Hz is too many samples"
        )));
    }
    Ok(())
}

pub struct ExperimentRegistry {
    factories: BTreeMap<String, ExperimentFactory>,
}

impl Default for ExperimentRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ExperimentRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry preloaded with `hold` and `ramp`.
    pub fn with_builtin() -> Self {
        let mut reg = Self::empty();
        reg.register(builtin::HOLD, builtin::Hold::from_params);
        reg.register(builtin::RAMP, builtin::Ramp::from_params);
        reg
    }

    pub fn register(&mut self, experiment_type: &str, factory: ExperimentFactory) {
        self.factories.insert(experiment_type.to_string(), factory);
    }

    pub fn create(&self, experiment_type: &str, params: &toml::Table) -> Result<Box<dyn Experiment>> {
        let factory = self.factories.get(experiment_type).ok_or_else(|| {
            LabbyError::Experiment(format!("unknown experiment type {experiment_type:?}"))
        })?;
        factory(params)
    }
}
