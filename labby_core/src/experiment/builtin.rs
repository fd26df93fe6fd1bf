//! Built-in experiments: `hold` and `ramp`.
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use super::{Experiment, ExperimentContext, check_timing, parse_params};
use crate::error::Result;
use crate::hw_error::lift;
use crate::util::duration_from_secs;

pub const HOLD: &str = "hold";
pub const RAMP: &str = "ramp";

fn default_voltage() -> f64 {
    6.0
}

fn default_rate() -> f64 {
    1.0
}

fn default_duration() -> f64 {
    3600.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoldParams {
    pub device: String,
    #[serde(default = "default_voltage")]
    pub voltage_in_volts: f64,
    pub current_in_amps: f64,
    #[serde(default = "default_rate")]
    pub sampling_rate_hz: f64,
    #[serde(default = "default_duration")]
    pub duration_in_seconds: f64,
}

/// Holds one setpoint and logs what the supply delivers.
#[derive(Debug)]
pub struct Hold {
    params: HoldParams,
}

impl Hold {
    pub fn new(params: HoldParams) -> Result<Self> {
        check_timing(HOLD, params.sampling_rate_hz, params.duration_in_seconds)?;
        check_setpoint(HOLD, "voltage_in_volts", params.voltage_in_volts)?;
        check_setpoint(HOLD, "current_in_amps", params.current_in_amps)?;
        Ok(Self { params })
    }

    pub fn from_params(params: &toml::Table) -> Result<Box<dyn Experiment>> {
        let experiment: Box<dyn Experiment> = Box::new(Self::new(parse_params(HOLD, params)?)?);
        Ok(experiment)
    }
}

impl Experiment for Hold {
    fn experiment_type(&self) -> &str {
        HOLD
    }

    fn sampling_rate_hz(&self) -> f64 {
        self.params.sampling_rate_hz
    }

    fn duration(&self) -> Duration {
        duration_from_secs(self.params.duration_in_seconds)
    }

    fn columns(&self) -> Vec<String> {
        vec!["voltage".into(), "current".into()]
    }

    fn start(&mut self, ctx: &mut ExperimentContext<'_>) -> Result<()> {
        let name = self.params.device.as_str();
        let psu = ctx.power_supply(name)?;
        psu.set_target_voltage(self.params.voltage_in_volts)
            .map_err(lift(name))?;
        psu.set_target_current(self.params.current_in_amps)
            .map_err(lift(name))?;
        psu.set_output_on(true).map_err(lift(name))?;
        info!(
            device = name,
            voltage = self.params.voltage_in_volts,
            current = self.params.current_in_amps,
            "hold started"
        );
        Ok(())
    }

    fn measure(&mut self, ctx: &mut ExperimentContext<'_>, _elapsed: Duration) -> Result<Vec<f64>> {
        let name = self.params.device.as_str();
        let psu = ctx.power_supply(name)?;
        let voltage = psu.get_actual_voltage().map_err(lift(name))?;
        let current = psu.get_actual_current().map_err(lift(name))?;
        Ok(vec![voltage, current])
    }

    fn stop(&mut self, ctx: &mut ExperimentContext<'_>) -> Result<()> {
        let name = self.params.device.as_str();
        ctx.power_supply(name)?
            .set_output_on(false)
            .map_err(lift(name))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RampParams {
    pub device: String,
    pub start_voltage_in_volts: f64,
    pub end_voltage_in_volts: f64,
    pub current_in_amps: f64,
    #[serde(default = "default_rate")]
    pub sampling_rate_hz: f64,
    #[serde(default = "default_duration")]
    pub duration_in_seconds: f64,
}

/// Sweeps the voltage linearly from start to end over the duration.
#[derive(Debug)]
pub struct Ramp {
    params: RampParams,
}

impl Ramp {
    pub fn new(params: RampParams) -> Result<Self> {
        check_timing(RAMP, params.sampling_rate_hz, params.duration_in_seconds)?;
        check_setpoint(RAMP, "start_voltage_in_volts", params.start_voltage_in_volts)?;
        check_setpoint(RAMP, "end_voltage_in_volts", params.end_voltage_in_volts)?;
        check_setpoint(RAMP, "current_in_amps", params.current_in_amps)?;
        Ok(Self { params })
    }

    pub fn from_params(params: &toml::Table) -> Result<Box<dyn Experiment>> {
        let experiment: Box<dyn Experiment> = Box::new(Self::new(parse_params(RAMP, params)?)?);
        Ok(experiment)
    }

    /// Voltage setpoint `elapsed` into the ramp, clamped to the end voltage.
    pub fn voltage_at(&self, elapsed: Duration) -> f64 {
        let p = &self.params;
        let fraction = if p.duration_in_seconds > 0.0 {
            (elapsed.as_secs_f64() / p.duration_in_seconds).min(1.0)
        } else {
            1.0
        };
        p.start_voltage_in_volts + (p.end_voltage_in_volts - p.start_voltage_in_volts) * fraction
    }
}

impl Experiment for Ramp {
    fn experiment_type(&self) -> &str {
        RAMP
    }

    fn sampling_rate_hz(&self) -> f64 {
        self.params.sampling_rate_hz
    }

    fn duration(&self) -> Duration {
        duration_from_secs(self.params.duration_in_seconds)
    }

    fn columns(&self) -> Vec<String> {
        vec!["target_voltage".into(), "voltage".into(), "current".into()]
    }

    fn start(&mut self, ctx: &mut ExperimentContext<'_>) -> Result<()> {
        let name = self.params.device.as_str();
        let psu = ctx.power_supply(name)?;
        psu.set_target_current(self.params.current_in_amps)
            .map_err(lift(name))?;
        psu.set_target_voltage(self.params.start_voltage_in_volts)
            .map_err(lift(name))?;
        psu.set_output_on(true).map_err(lift(name))?;
        info!(
            device = name,
            from = self.params.start_voltage_in_volts,
            to = self.params.end_voltage_in_volts,
            "ramp started"
        );
        Ok(())
    }

    fn measure(&mut self, ctx: &mut ExperimentContext<'_>, elapsed: Duration) -> Result<Vec<f64>> {
        let target = self.voltage_at(elapsed);
        let name = self.params.device.as_str();
        let psu = ctx.power_supply(name)?;
        psu.set_target_voltage(target).map_err(lift(name))?;
        let voltage = psu.get_actual_voltage().map_err(lift(name))?;
        let current = psu.get_actual_current().map_err(lift(name))?;
        Ok(vec![target, voltage, current])
    }

    fn stop(&mut self, ctx: &mut ExperimentContext<'_>) -> Result<()> {
        let name = self.params.device.as_str();
        ctx.power_supply(name)?
            .set_output_on(false)
            .map_err(lift(name))
    }
}

fn check_setpoint(experiment_type: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(crate::error::LabbyError::Experiment(format!(
            "{experiment_type}: {field} must be >= 0, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table(src: &str) -> toml::Table {
        src.parse().unwrap()
    }

    #[test]
    fn hold_defaults() {
        let exp = Hold::from_params(&table("device = \"psu\"\ncurrent_in_amps = 7")).unwrap();
        assert_eq!(exp.sampling_rate_hz(), 1.0);
        assert_eq!(exp.duration(), Duration::from_secs(3600));
        assert_eq!(exp.columns(), ["voltage", "current"]);
    }

    #[test]
    fn hold_requires_current() {
        assert!(Hold::from_params(&table("device = \"psu\"")).is_err());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let err = Hold::from_params(&table(
            "device = \"psu\"\ncurrent_in_amps = 1\nsampling_rate_hz = 0",
        ))
        .err().unwrap();
        assert!(err.to_string().contains("sampling_rate_hz"));
    }

    #[rstest]
    #[case("sampling_rate_hz = 1e20\nduration_in_seconds = 1", "too many samples")]
    #[case("duration_in_seconds = 1e20", "too large")]
    #[case("sampling_rate_hz = 1e6\nduration_in_seconds = 1e10", "too many samples")]
    fn oversized_timing_is_rejected(#[case] timing: &str, #[case] reason: &str) {
        let src = format!("device = \"psu\"\ncurrent_in_amps = 1\n{timing}");
        let err = Hold::from_params(&table(&src)).err().unwrap();
        assert!(err.to_string().contains(reason), "{err}");
        let src = format!(
            "device = \"psu\"\nstart_voltage_in_volts = 0\nend_voltage_in_volts = 1\ncurrent_in_amps = 1\n{timing}"
        );
        assert!(Ramp::from_params(&table(&src)).is_err());
    }

    #[test]
    fn ramp_interpolates_and_clamps() {
        let ramp = Ramp::new(RampParams {
            device: "psu".into(),
            start_voltage_in_volts: 2.0,
            end_voltage_in_volts: 12.0,
            current_in_amps: 1.0,
            sampling_rate_hz: 1.0,
            duration_in_seconds: 10.0,
        })
        .unwrap();
        assert_eq!(ramp.voltage_at(Duration::ZERO), 2.0);
        assert_eq!(ramp.voltage_at(Duration::from_secs(5)), 7.0);
        assert_eq!(ramp.voltage_at(Duration::from_secs(20)), 12.0);
    }
}
