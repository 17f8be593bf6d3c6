// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a fine-tuning run in order:
//
//   Step 1: Validate settings
//   Step 2: Create <exps_dir>/{models,tensorboard}   (Layer 6 - infra)
//   Step 3: Snapshot settings.json                    (Layer 6 - infra)
//   Step 4: Provision the model                       (Layer 5 - ml)
//   Step 5: Save model_config.json                    (Layer 6 - infra)
//   Step 6: Load + split the image folders            (Layer 4 - data)
//   Step 7: Register callbacks, move to device        (Layer 5 - ml)
//   Step 8: Build Adam, cross-entropy, data loaders   (Layer 5 - ml)
//   Step 9: Run the fit loop                          (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    nn::loss::CrossEntropyLossConfig,
    optim::AdamConfig,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::application::settings::Settings;
use crate::data::{
    batcher::{FaceBatch, FaceBatcher},
    dataset::FaceDataset,
    loader::ImageFolderLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::classes::ClassIndex;
use crate::infra::{
    checkpoint::CheckpointManager,
    tensorboard::TensorBoardWriter,
    weights::{WeightsCache, CASIA_WEBFACE_URL},
    workspace::ExperimentLayout,
};
use crate::ml::{
    callbacks::{DefaultModelCallback, TensorBoardCallback},
    model::InceptionResnetV1Config,
    provisioner::{provision, ModelOrigin, PretrainedWeights, ProvisionRequest},
    trainer::{FitOptions, FitReport, ModelHarness},
};

/// Result of a finished run.
#[derive(Debug)]
pub struct TrainOutcome {
    pub layout:  ExperimentLayout,
    pub origin:  ModelOrigin,
    pub classes: ClassIndex,
    pub report:  FitReport,
}

pub struct TrainUseCase {
    settings:     Settings,
    model_config: InceptionResnetV1Config,
}

impl TrainUseCase {
    pub fn new(settings: Settings) -> Self {
        Self { settings, model_config: InceptionResnetV1Config::new() }
    }

    /// Override the backbone architecture (block repeats, dropout, ...).
    #[cfg(test)]
    pub fn with_model_config(mut self, config: InceptionResnetV1Config) -> Self {
        self.model_config = config;
        self
    }

    /// Execute the full fine-tuning pipeline on backend `B`.
    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainOutcome> {
        let s = &self.settings;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        s.validate()?;

        // ── Step 2: Experiment directories ───────────────────────────────────
        let layout = ExperimentLayout::new(&s.exps_dir);
        layout.ensure()?;
        tracing::info!("Experiment directory: '{}'", layout.root().display());

        // ── Step 3: Settings snapshot ────────────────────────────────────────
        s.save(&layout.settings_json())?;

        // ── Step 4: Provision the model ──────────────────────────────────────
        let request = ProvisionRequest {
            checkpoint:      s.checkpoint.clone(),
            pretrained:      pretrained_source(s),
            freeze_backbone: s.freeze_backbone,
            base_config:     self.model_config.clone(),
        };
        let provisioned = provision::<B>(&request, device)?;
        tracing::info!("Model origin: {:?}", provisioned.origin);

        // ── Step 5: Architecture next to the checkpoints ─────────────────────
        let ckpt = CheckpointManager::new(layout.models_dir());
        ckpt.save_config(&provisioned.config)?;

        // ── Step 6: Data ─────────────────────────────────────────────────────
        let faces = ImageFolderLoader::new(&s.inputs_path).load_all()?;
        if faces.records.is_empty() {
            tracing::warn!(
                "No training images under '{}'; epochs will run without batches",
                s.inputs_path.display()
            );
        }

        let output_dim = provisioned.config.output_dim();
        if faces.classes.len() > output_dim {
            bail!(
                "Found {} classes but the model only produces {} outputs",
                faces.classes.len(),
                output_dim
            );
        }

        let (train_records, val_records) = split_train_val(faces.records, s.val_split, s.seed);
        tracing::info!(
            "{} classes, {} training / {} validation images",
            faces.classes.len(),
            train_records.len(),
            val_records.len()
        );
        let preprocessor = Preprocessor::new(s.image_size as u32);

        // ── Step 7: Callbacks + device ───────────────────────────────────────
        let mut harness = ModelHarness::new(provisioned.model);
        harness.register_callback(DefaultModelCallback::<B>::new(layout.metrics_csv())?);
        harness.register_callback(TensorBoardCallback::new(TensorBoardWriter::open(layout.tensorboard_dir())?));
        let mut harness = harness.to_device(device);

        // ── Step 8: Optimiser, loss, loaders ─────────────────────────────────
        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
        let criterion = CrossEntropyLossConfig::new().init(device);

        let train_loader: Arc<dyn DataLoader<FaceBatch<B>>> =
            DataLoaderBuilder::new(FaceBatcher::<B>::new(device.clone(), s.image_size))
                .batch_size(s.batch_size)
                .shuffle(s.seed)
                .num_workers(s.num_workers)
                .build(FaceDataset::new(train_records, preprocessor));

        let eval_loader: Option<Arc<dyn DataLoader<FaceBatch<B::InnerBackend>>>> =
            if val_records.is_empty() {
                None
            } else {
                Some(
                    DataLoaderBuilder::new(FaceBatcher::<B::InnerBackend>::new(device.clone(), s.image_size))
                        .batch_size(s.batch_size)
                        .num_workers(s.num_workers)
                        .build(FaceDataset::new(val_records, preprocessor)),
                )
            };

        // ── Step 9: Fit ──────────────────────────────────────────────────────
        let options = FitOptions {
            start_epoch:          provisioned.origin.start_epoch()?,
            epochs:               s.epochs,
            learning_rate:        s.lr_base,
            iterations_per_epoch: s.iterations_per_epoch,
            save_every:           s.save_every,
            evaluate_every:       true,
            checkpoint_dir:       layout.models_dir(),
        };
        tracing::info!(
            "Training epochs {}..={} (lr {}, batch {})",
            options.start_epoch,
            options.start_epoch.saturating_add(options.epochs.saturating_sub(1)),
            options.learning_rate,
            s.batch_size
        );

        let report = harness.fit(train_loader, eval_loader, &criterion, &mut optim, &options)?;

        Ok(TrainOutcome {
            layout,
            origin: provisioned.origin,
            classes: faces.classes,
            report,
        })
    }
}

/// Explicit file, else the casia-webface release through the cache,
/// unless random initialisation was asked for.
fn pretrained_source(s: &Settings) -> PretrainedWeights {
    if s.random_init {
        return PretrainedWeights::Random;
    }
    match &s.pretrained {
        Some(path) => PretrainedWeights::File(path.clone()),
        None => PretrainedWeights::Download {
            url:       CASIA_WEBFACE_URL.to_string(),
            cache_dir: s
                .weights_cache
                .clone()
                .unwrap_or_else(|| WeightsCache::default_dir(&s.exps_dir.join("weights"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::settings::ComputeBackend;
    use crate::ml::model::tests::tiny_config;
    use burn::backend::{Autodiff, NdArray};
    use image::{Rgb, RgbImage};
    use std::{fs, path::{Path, PathBuf}};
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    fn write_faces(root: &Path, classes: &[&str], per_class: usize) {
        for (c, name) in classes.iter().enumerate() {
            let dir = root.join(name);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..per_class {
                let shade = (c * 80 + i * 10) as u8;
                RgbImage::from_pixel(24, 24, Rgb([shade, 255 - shade, shade / 2]))
                    .save(dir.join(format!("{i}.png")))
                    .unwrap();
            }
        }
    }

    fn settings(tmp: &Path) -> Settings {
        Settings {
            inputs_path:          tmp.join("features"),
            log_file:             tmp.join("log.log"),
            exps_dir:             tmp.join("myrun"),
            batch_size:           2,
            iterations_per_epoch: 2,
            epochs:               1,
            image_size:           80,
            val_split:            0.25,
            num_workers:          1,
            backend:              ComputeBackend::NdArray,
            random_init:          true,
            ..Settings::default()
        }
    }

    #[test]
    fn test_end_to_end_frozen_run() {
        let tmp = TempDir::new().unwrap();
        write_faces(&tmp.path().join("features"), &["alice", "bob"], 4);

        let outcome = TrainUseCase::new(settings(tmp.path()))
            .with_model_config(tiny_config())
            .execute::<TestBackend>(&Default::default())
            .unwrap();

        let root = tmp.path().join("myrun");
        assert!(root.join("models").is_dir());
        assert!(root.join("tensorboard").is_dir());
        assert!(root.join("settings.json").exists());
        assert!(root.join("metrics.csv").exists());
        assert!(root.join("models/model_config.json").exists());
        assert!(root.join("models/epoch_1.mpk.gz").exists());

        assert_eq!(outcome.classes.len(), 2);
        assert_eq!(outcome.origin, ModelOrigin::Fresh { pretrained: false, frozen: true });
        assert!(!outcome.report.learned);
        assert_eq!(outcome.report.epochs[0].iterations, 2);
        assert_eq!(outcome.report.last().unwrap().eval.unwrap().samples, 2);
    }

    #[test]
    fn test_invalid_settings_create_nothing() {
        let tmp = TempDir::new().unwrap();
        let bad = Settings { batch_size: 0, ..settings(tmp.path()) };

        let result = TrainUseCase::new(bad)
            .with_model_config(tiny_config())
            .execute::<TestBackend>(&Default::default());

        assert!(result.is_err());
        assert!(!tmp.path().join("myrun").exists());
    }

    #[test]
    fn test_empty_inputs_still_checkpoint_each_epoch() {
        let tmp = TempDir::new().unwrap();
        let s = Settings { epochs: 3, save_every: 1, ..settings(tmp.path()) };

        let outcome = TrainUseCase::new(s)
            .with_model_config(tiny_config())
            .execute::<TestBackend>(&Default::default())
            .unwrap();

        assert_eq!(outcome.report.epochs.len(), 3);
        for epoch in 1..=3 {
            assert!(tmp.path().join(format!("myrun/models/epoch_{epoch}.mpk.gz")).exists());
        }
    }

    #[test]
    fn test_pretrained_source_defaults_to_cached_download() {
        let s = Settings {
            weights_cache: Some(PathBuf::from("/tmp/weights")),
            ..Settings::default()
        };
        assert_eq!(
            pretrained_source(&s),
            PretrainedWeights::Download {
                url:       CASIA_WEBFACE_URL.to_string(),
                cache_dir: PathBuf::from("/tmp/weights"),
            }
        );

        let explicit = Settings { pretrained: Some(PathBuf::from("w.pt")), ..Settings::default() };
        assert_eq!(pretrained_source(&explicit), PretrainedWeights::File(PathBuf::from("w.pt")));

        let random = Settings { random_init: true, ..Settings::default() };
        assert_eq!(pretrained_source(&random), PretrainedWeights::Random);
    }
}
