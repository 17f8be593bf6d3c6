// ============================================================
// Layer 2 — Settings
// ============================================================
// The flat, immutable record a run is configured from.
// Built once from the CLI flags, validated, then snapshotted to
// <exps_dir>/settings.json so a run can be reproduced later.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::MIN_IMAGE_SIZE;

/// Which Burn backend the run executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    Wgpu,
    NdArray,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of `<class_name>/<image>` folders
    pub inputs_path:          PathBuf,
    pub log_file:             PathBuf,
    pub exps_dir:             PathBuf,
    pub checkpoint:           Option<PathBuf>,
    pub batch_size:           usize,
    pub save_every:           usize,
    pub lr_base:              f64,
    pub iterations_per_epoch: usize,
    pub epochs:               usize,
    /// facenet-pytorch state dict to initialise the backbone from;
    /// when absent the casia-webface release is downloaded and cached
    pub pretrained:           Option<PathBuf>,
    /// Where downloaded weights are kept (user cache dir when absent)
    pub weights_cache:        Option<PathBuf>,
    /// Skip pretrained weights entirely and keep random initialisation
    pub random_init:          bool,
    pub freeze_backbone:      bool,
    pub image_size:           usize,
    pub val_split:            f64,
    pub seed:                 u64,
    pub num_workers:          usize,
    pub backend:              ComputeBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inputs_path:          PathBuf::from("features"),
            log_file:             PathBuf::from("log.log"),
            exps_dir:             PathBuf::from("exps"),
            checkpoint:           None,
            batch_size:           60,
            save_every:           1,
            lr_base:              0.01,
            iterations_per_epoch: 20000,
            epochs:               2,
            pretrained:           None,
            weights_cache:        None,
            random_init:          false,
            freeze_backbone:      true,
            image_size:           160,
            val_split:            0.2,
            seed:                 42,
            num_workers:          1,
            backend:              ComputeBackend::Wgpu,
        }
    }
}

impl Settings {
    /// Reject values that would only fail later, deep inside training.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be greater than 0");
        }
        if self.iterations_per_epoch == 0 {
            bail!("iterations_per_epoch must be greater than 0");
        }
        if !self.lr_base.is_finite() || self.lr_base <= 0.0 {
            bail!("lr_base must be a positive number, got {}", self.lr_base);
        }
        if self.image_size < MIN_IMAGE_SIZE {
            bail!(
                "image_size must be at least {} pixels, got {}",
                MIN_IMAGE_SIZE,
                self.image_size
            );
        }
        if self.random_init && self.pretrained.is_some() {
            bail!("random_init and pretrained cannot be used together");
        }
        if !(0.0..1.0).contains(&self.val_split) {
            bail!("val_split must be in [0, 1), got {}", self.val_split);
        }
        Ok(())
    }

    /// Write a pretty-printed JSON snapshot to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write settings to '{}'", path.display()))?;
        Ok(())
    }
}
