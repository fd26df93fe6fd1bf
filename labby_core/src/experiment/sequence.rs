//! Experiment sequences loaded from `[[sequence]]` TOML files.
use std::path::Path;

use eyre::WrapErr;
use labby_config::load_sequence_toml;

use super::{Experiment, ExperimentRegistry};

/// One experiment of a sequence with its id (`000`, `001`, ...).
pub struct PlannedExperiment {
    pub id: String,
    pub experiment: Box<dyn Experiment>,
}

pub struct ExperimentSequence {
    /// Output subdirectory name, the sequence file stem.
    pub name: String,
    pub experiments: Vec<PlannedExperiment>,
}

impl ExperimentSequence {
    /// Build every entry of `text` through `registry`. Fails on the first bad entry.
    pub fn from_toml(name: &str, text: &str, registry: &ExperimentRegistry) -> eyre::Result<Self> {
        let file = load_sequence_toml(text)?;
        let experiments = file
            .sequence
            .iter()
            .enumerate()
            .map(|(index, entry)| -> eyre::Result<PlannedExperiment> {
                let experiment = registry
                    .create(&entry.experiment_type, &entry.params)
                    .wrap_err_with(|| format!("sequence[{index}]"))?;
                Ok(PlannedExperiment {
                    id: format!("{index:03}"),
                    experiment,
                })
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            experiments,
        })
    }

    pub fn from_path(path: &Path, registry: &ExperimentRegistry) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read sequence {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("sequence");
        Self::from_toml(name, &text, registry)
            .wrap_err_with(|| format!("invalid sequence in {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}
