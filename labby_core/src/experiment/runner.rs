//! Runs experiment sequences, pacing samples on a `Clock` and writing CSV.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use labby_traits::Clock;
use tracing::{info, warn};

use super::sequence::{ExperimentSequence, PlannedExperiment};
use super::{Experiment, ExperimentContext};
use crate::controller::DeviceController;
use crate::error::LabbyError;
use crate::util::{format_value, sample_count, sample_offset};

/// Longest sleep between two shutdown checks.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root directory; each sequence writes into `<output_dir>/<sequence name>/`.
    pub output_dir: PathBuf,
    /// Set from a signal handler to stop between samples.
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            shutdown: None,
        }
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }
}

/// What one finished experiment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentReport {
    pub id: String,
    pub experiment_type: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Run every experiment of `sequence` in order. Stops at the first failure.
pub fn run_sequence<C: Clock>(
    sequence: &mut ExperimentSequence,
    controller: &mut DeviceController,
    clock: &C,
    opts: &RunOptions,
) -> eyre::Result<Vec<ExperimentReport>> {
    let dir = opts.output_dir.join(&sequence.name);
    fs::create_dir_all(&dir).wrap_err_with(|| format!("create {}", dir.display()))?;
    info!(
        sequence = %sequence.name,
        experiments = sequence.len(),
        dir = %dir.display(),
        "sequence start"
    );

    let mut reports = Vec::with_capacity(sequence.len());
    for planned in &mut sequence.experiments {
        let report = run_experiment(planned, controller, clock, &dir, opts)
            .wrap_err_with(|| format!("experiment {} failed", planned.id))?;
        reports.push(report);
    }
    info!(sequence = %sequence.name, "sequence complete");
    Ok(reports)
}

fn run_experiment<C: Clock>(
    planned: &mut PlannedExperiment,
    controller: &mut DeviceController,
    clock: &C,
    dir: &Path,
    opts: &RunOptions,
) -> eyre::Result<ExperimentReport> {
    let path = dir.join(format!("{}.csv", planned.id));
    let experiment = planned.experiment.as_mut();
    let mut writer =
        csv::Writer::from_path(&path).wrap_err_with(|| format!("create {}", path.display()))?;
    let mut header = vec!["seconds".to_string()];
    header.extend(experiment.columns());
    writer.write_record(&header)?;
    writer.flush()?;

    info!(
        id = %planned.id,
        kind = experiment.experiment_type(),
        rate_hz = experiment.sampling_rate_hz(),
        duration_s = experiment.duration().as_secs_f64(),
        "experiment start"
    );

    let mut ctx = ExperimentContext::new(controller);
    experiment.start(&mut ctx)?;
    let sampled = sample_loop(&mut *experiment, &mut ctx, &mut writer, clock, opts);
    let stopped = experiment.stop(&mut ctx);
    ctx.close_all();

    if let Err(e) = &stopped {
        warn!(id = %planned.id, error = %e, "stop failed");
    }
    let rows = sampled?;
    stopped?;
    info!(id = %planned.id, rows, "experiment complete");
    Ok(ExperimentReport {
        id: planned.id.clone(),
        experiment_type: experiment.experiment_type().to_string(),
        path,
        rows,
    })
}

fn sample_loop<C: Clock, W: std::io::Write>(
    experiment: &mut dyn Experiment,
    ctx: &mut ExperimentContext<'_>,
    writer: &mut csv::Writer<W>,
    clock: &C,
    opts: &RunOptions,
) -> eyre::Result<usize> {
    let rate = experiment.sampling_rate_hz();
    let samples = sample_count(rate, experiment.duration());
    let epoch = clock.now();
    let mut rows = 0;
    for k in 0..samples {
        let offset = sample_offset(k, rate);
        if !wait_until(clock, epoch.checked_add(offset), opts) {
            warn!(rows, "interrupted");
            return Err(LabbyError::Interrupted.into());
        }
        let values = experiment.measure(ctx, offset)?;
        let mut record = Vec::with_capacity(values.len() + 1);
        record.push(format_value(k as f64 / rate));
        record.extend(values.into_iter().map(format_value));
        writer.write_record(&record)?;
        writer.flush()?;
        rows += 1;
    }
    Ok(rows)
}

/// Sleep until `deadline` (`None` never arrives). Returns `false` as soon as
/// shutdown is requested.
fn wait_until<C: Clock>(clock: &C, deadline: Option<Instant>, opts: &RunOptions) -> bool {
    loop {
        if opts.interrupted() {
            return false;
        }
        let remaining =
            deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(clock.now()));
        if remaining.is_zero() {
            return true;
        }
        let slice = match opts.shutdown {
            Some(_) => remaining.min(SHUTDOWN_POLL),
            None => remaining,
        };
        clock.sleep(slice);
    }
}
