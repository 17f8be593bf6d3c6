// ============================================================
// Layer 5 — Model Provisioner
// ============================================================
// Decides where the model comes from:
//
//   --checkpoint given and present
//       → rebuild from model_config.json, load the record,
//         resume numbering at epoch n + 1. Nothing frozen.
//
//   otherwise
//       → casia-webface backbone (10575-way logits)
//       → facenet-pytorch weights: --pretrained file, else the
//         cached / downloaded casia-webface release, unless
//         --random_init opts out
//       → freeze every parameter (--freeze_backbone)
//       → drop the logits head (pass-through)
//
// Pretrained weights are a PyTorch state dict; burn-import maps
// `bn.weight/bias` onto `gamma/beta` and transposes Linear
// weights, so the record loads straight into the module tree.

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::{Path, PathBuf};

use crate::infra::{
    checkpoint::{epoch_from_path, load_config_near, load_model, resolve_checkpoint},
    weights::WeightsCache,
};
use crate::ml::model::{InceptionResnetV1, InceptionResnetV1Config, InceptionResnetV1Record, CASIA_WEBFACE_CLASSES};

/// Where a provisioned model came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOrigin {
    Checkpoint { path: PathBuf, epoch: Option<usize> },
    Fresh { pretrained: bool, frozen: bool },
}

impl ModelOrigin {
    /// First epoch number training should use.
    pub fn start_epoch(&self) -> Result<usize> {
        match self {
            ModelOrigin::Checkpoint { epoch: Some(n), path } => n
                .checked_add(1)
                .with_context(|| format!("Checkpoint '{}' has an epoch number too large to resume from", path.display())),
            _ => Ok(1),
        }
    }
}

/// Where backbone weights for a fresh model come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PretrainedWeights {
    /// A local facenet-pytorch state dict
    File(PathBuf),
    /// A release asset, cached under `cache_dir` after the first download
    Download { url: String, cache_dir: PathBuf },
    /// Keep the random initialisation
    Random,
}

#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub checkpoint:      Option<PathBuf>,
    pub pretrained:      PretrainedWeights,
    pub freeze_backbone: bool,
    /// Architecture used for fresh models and for checkpoints
    /// without a model_config.json beside them
    pub base_config:     InceptionResnetV1Config,
}

pub struct ProvisionedModel<B: Backend> {
    pub model:  InceptionResnetV1<B>,
    /// Config that rebuilds `model` exactly (head included)
    pub config: InceptionResnetV1Config,
    pub origin: ModelOrigin,
}

pub fn provision<B: Backend>(request: &ProvisionRequest, device: &B::Device) -> Result<ProvisionedModel<B>> {
    let Some(path) = &request.checkpoint else {
        return fresh(request, device);
    };
    match resolve_checkpoint(path) {
        Some(file) => from_checkpoint(&file, &request.base_config, device),
        None => {
            tracing::warn!(
                "Checkpoint '{}' does not exist, building a fresh model instead",
                path.display()
            );
            fresh(request, device)
        }
    }
}

fn from_checkpoint<B: Backend>(
    path:        &Path,
    base_config: &InceptionResnetV1Config,
    device:      &B::Device,
) -> Result<ProvisionedModel<B>> {
    let config = match load_config_near(path)? {
        Some(cfg) => cfg,
        None => {
            tracing::warn!(
                "No model_config.json beside '{}', assuming the default architecture",
                path.display()
            );
            base_config.clone()
        }
    };

    let epoch  = epoch_from_path(path);
    let origin = ModelOrigin::Checkpoint { path: path.to_path_buf(), epoch };
    origin.start_epoch()?;

    let model = load_model(config.init::<B>(device), path, device)?;
    tracing::info!("Loaded checkpoint '{}' (epoch {:?})", path.display(), epoch);

    Ok(ProvisionedModel { model, config, origin })
}

fn fresh<B: Backend>(request: &ProvisionRequest, device: &B::Device) -> Result<ProvisionedModel<B>> {
    let casia = request.base_config.clone().with_num_classes(Some(CASIA_WEBFACE_CLASSES));
    let mut model = casia.init::<B>(device);

    let weights = match &request.pretrained {
        PretrainedWeights::File(path) => Some(path.clone()),
        PretrainedWeights::Download { url, cache_dir } => Some(WeightsCache::new(cache_dir).fetch(url)?),
        PretrainedWeights::Random => None,
    };

    let pretrained = match weights {
        Some(path) => {
            model = load_pretrained(model, &path, device)?;
            tracing::info!("Loaded pretrained weights from '{}'", path.display());
            true
        }
        None => {
            tracing::warn!("Random initialisation requested, backbone is not pretrained");
            false
        }
    };

    if request.freeze_backbone {
        model = model.freeze();
        tracing::info!("Backbone frozen");
    }

    let model  = model.with_head(None);
    let config = casia.with_num_classes(None);

    Ok(ProvisionedModel {
        model,
        config,
        origin: ModelOrigin::Fresh { pretrained, frozen: request.freeze_backbone },
    })
}

/// Load a facenet-pytorch state dict (`.pt`) into `model`.
pub fn load_pretrained<B: Backend>(
    model:   InceptionResnetV1<B>,
    weights: &Path,
    device:  &B::Device,
) -> Result<InceptionResnetV1<B>> {
    if !weights.exists() {
        bail!("Pretrained weights '{}' not found", weights.display());
    }
    let record: InceptionResnetV1Record<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(LoadArgs::new(weights.to_path_buf()), device)
        .map_err(|e| anyhow::anyhow!("Cannot load pretrained weights '{}': {:?}", weights.display(), e))?;
    Ok(model.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::CheckpointManager;
    use crate::ml::model::tests::{sampled_params_require_grad, tiny_config};
    use burn::backend::{Autodiff, NdArray};
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn request(checkpoint: Option<PathBuf>) -> ProvisionRequest {
        ProvisionRequest {
            checkpoint,
            pretrained:      PretrainedWeights::Random,
            freeze_backbone: true,
            base_config:     tiny_config(),
        }
    }

    #[test]
    fn test_fresh_model_is_frozen_with_pass_through_head() {
        let device = Default::default();
        let p = provision::<TestBackend>(&request(None), &device).unwrap();

        assert!(!p.model.has_head());
        assert!(sampled_params_require_grad(&p.model).iter().all(|&g| !g));
        assert_eq!(p.origin, ModelOrigin::Fresh { pretrained: false, frozen: true });
        assert_eq!(p.config.num_classes, None);
        assert_eq!(p.origin.start_epoch().unwrap(), 1);
    }

    #[test]
    fn test_freeze_can_be_disabled() {
        let device = Default::default();
        let mut req = request(None);
        req.freeze_backbone = false;

        let p = provision::<TestBackend>(&req, &device).unwrap();
        assert!(sampled_params_require_grad(&p.model).iter().all(|&g| g));
        assert_eq!(p.origin, ModelOrigin::Fresh { pretrained: false, frozen: false });
    }

    #[test]
    fn test_missing_checkpoint_falls_back_to_fresh() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let p = provision::<TestBackend>(&request(Some(tmp.path().join("epoch_9.mpk.gz"))), &device).unwrap();

        assert!(matches!(p.origin, ModelOrigin::Fresh { .. }));
        assert!(!p.model.has_head());
    }

    #[test]
    fn test_existing_checkpoint_is_loaded_unfrozen() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();

        let config = tiny_config();
        let saved: InceptionResnetV1<TestBackend> = config.init(&device);
        let manager = CheckpointManager::new(tmp.path());
        manager.save_config(&config).unwrap();
        let path = manager.save_model::<TestBackend, _>(&saved, 4).unwrap();

        let p = provision::<TestBackend>(&request(Some(path.clone())), &device).unwrap();

        assert_eq!(p.origin, ModelOrigin::Checkpoint { path, epoch: Some(4) });
        assert_eq!(p.origin.start_epoch().unwrap(), 5);
        assert!(sampled_params_require_grad(&p.model).iter().all(|&g| g));
        saved
            .last_linear
            .weight
            .val()
            .into_data()
            .assert_approx_eq(&p.model.last_linear.weight.val().into_data(), 2);
    }

    #[test]
    fn test_missing_pretrained_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let mut req = request(None);
        req.pretrained = PretrainedWeights::File(tmp.path().join("casia.pt"));

        let err = provision::<TestBackend>(&req, &device).err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_checkpoint_named_without_extension_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();

        let config = tiny_config();
        let manager = CheckpointManager::new(tmp.path());
        manager.save_config(&config).unwrap();
        let path = manager
            .save_model::<TestBackend, _>(&config.init::<TestBackend>(&device), 2)
            .unwrap();

        let p = provision::<TestBackend>(&request(Some(tmp.path().join("epoch_2"))), &device).unwrap();
        assert_eq!(p.origin, ModelOrigin::Checkpoint { path, epoch: Some(2) });
    }

    #[test]
    fn test_epoch_number_at_usize_max_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let path = tmp.path().join(format!("epoch_{}.mpk.gz", usize::MAX));
        std::fs::write(&path, b"unused").unwrap();

        let err = provision::<TestBackend>(&request(Some(path)), &device).err().unwrap();
        assert!(err.to_string().contains("too large to resume"));
    }

    #[test]
    fn test_download_source_reuses_cached_file() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        // Garbage in the cache: reaching the decoder proves no download was attempted
        std::fs::write(tmp.path().join("casia.pt"), b"not a state dict").unwrap();

        let mut req = request(None);
        req.pretrained = PretrainedWeights::Download {
            url:       "http://127.0.0.1:9/casia.pt".to_string(),
            cache_dir: tmp.path().to_path_buf(),
        };

        let err = provision::<TestBackend>(&req, &device).err().unwrap();
        assert!(err.to_string().contains("Cannot load pretrained weights"));
    }

    #[test]
    fn test_download_failure_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let mut req = request(None);
        req.pretrained = PretrainedWeights::Download {
            url:       "http://127.0.0.1:9/casia.pt".to_string(),
            cache_dir: tmp.path().join("cache"),
        };

        let err = provision::<TestBackend>(&req, &device).err().unwrap();
        assert!(format!("{err:#}").contains("Request to"));
    }
}
