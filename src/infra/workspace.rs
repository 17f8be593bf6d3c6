// ============================================================
// Layer 6 — Experiment Layout
// ============================================================
// Filesystem layout of one experiment:
//
//   <exps_dir>/
//     models/          checkpoints + model_config.json
//     tensorboard/     event files
//     metrics.csv      per-epoch metrics
//     settings.json    snapshot of the run's settings
//
// `ensure` is idempotent: running it on an existing tree is a
// no-op, and it never removes anything.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone)]
pub struct ExperimentLayout {
    root: PathBuf,
}

impl ExperimentLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn tensorboard_dir(&self) -> PathBuf {
        self.root.join("tensorboard")
    }

    pub fn metrics_csv(&self) -> PathBuf {
        self.root.join("metrics.csv")
    }

    pub fn settings_json(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    /// Create root, models and tensorboard directories if missing.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.models_dir(), self.tensorboard_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
        }
        tracing::debug!("Experiment directories ready under '{}'", self.root.display());
        Ok(())
    }
}
