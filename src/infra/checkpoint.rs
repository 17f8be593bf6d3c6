// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder
// (MessagePack, gzip-compressed, half precision).
//
// Directory layout (<exps_dir>/models):
//   epoch_1.mpk.gz        ← weights after epoch 1
//   epoch_2.mpk.gz        ← weights after epoch 2
//   latest_epoch.json     ← number of the newest checkpoint
//   model_config.json     ← architecture needed to rebuild the model
//
// Burn records only hold tensors, so the architecture config is
// stored next to them; loading builds a skeleton from the config
// and pours the record into it.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::InceptionResnetV1Config;

/// Extension CompactRecorder appends to every record path
pub const CHECKPOINT_EXTENSION: &str = "mpk.gz";

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";

/// Manages saving and loading of model checkpoints in one directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// The directory itself is created by the experiment bootstrapper.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the checkpoint file written for `epoch`.
    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("epoch_{epoch}.{CHECKPOINT_EXTENSION}"))
    }

    /// Save model weights for a given epoch and update the latest pointer.
    /// Returns the path of the written file.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<PathBuf> {
        // The recorder adds the extension itself
        let stem = self.dir.join(format!("epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), stem.clone())
            .map_err(|e| anyhow::anyhow!("Failed to save checkpoint to '{}': {:?}", stem.display(), e))?;

        let latest_path = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        let path = self.checkpoint_path(epoch);
        tracing::debug!("Saved checkpoint: epoch {} → '{}'", epoch, path.display());
        Ok(path)
    }

    /// Save the architecture config so checkpoints can be reloaded.
    pub fn save_config(&self, cfg: &InceptionResnetV1Config) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }
}

/// Architecture config stored next to `checkpoint`, if any.
pub fn load_config_near(checkpoint: &Path) -> Result<Option<InceptionResnetV1Config>> {
    let dir  = checkpoint.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(MODEL_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    InceptionResnetV1Config::load(&path)
        .map(Some)
        .map_err(|e| anyhow::anyhow!("Cannot parse model config '{}': {:?}", path.display(), e))
}

/// Load the record at `checkpoint` into `model`.
///
/// `checkpoint` may name the file with or without its
/// `.mpk.gz` extension.
pub fn load_model<B: Backend, M: Module<B>>(model: M, checkpoint: &Path, device: &B::Device) -> Result<M> {
    let stem = record_stem(checkpoint);
    let record = CompactRecorder::new()
        .load(stem.clone(), device)
        .map_err(|e| anyhow::anyhow!("Cannot load checkpoint '{}': {:?}", checkpoint.display(), e))?;
    Ok(model.load_record(record))
}

/// The checkpoint file `path` refers to, accepting the name with or
/// without its `.mpk.gz` extension. `None` when neither exists.
pub fn resolve_checkpoint(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let with_ext = PathBuf::from(format!("{}.{CHECKPOINT_EXTENSION}", record_stem(path).display()));
    with_ext.is_file().then_some(with_ext)
}

/// Strip the recorder extension so the recorder does not add it twice.
pub fn record_stem(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_suffix(&format!(".{CHECKPOINT_EXTENSION}")) {
        Some(stem) => PathBuf::from(stem),
        None       => path.to_path_buf(),
    }
}

/// Epoch encoded in a checkpoint file name (`epoch_<n>[.mpk.gz]`).
pub fn epoch_from_path(path: &Path) -> Option<usize> {
    record_stem(path)
        .file_name()?
        .to_str()?
        .strip_prefix("epoch_")?
        .parse()
        .ok()
}
