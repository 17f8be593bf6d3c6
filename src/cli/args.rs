// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Every flag of a fine-tuning run. Flag names are snake_case
// (`--inputs_path`, `--lr_base`, ...) and all of them are
// optional.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for unknown flags or bad values
//   - type conversion (string → usize, f64, PathBuf, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{ArgAction, Args, ValueEnum};
use std::path::PathBuf;

use crate::application::settings::{ComputeBackend, Settings};

/// Burn backend selectable from the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// GPU through wgpu (Vulkan / Metal / DX12)
    Wgpu,
    /// CPU, pure Rust
    Ndarray,
}

impl From<BackendKind> for ComputeBackend {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Wgpu    => ComputeBackend::Wgpu,
            BackendKind::Ndarray => ComputeBackend::NdArray,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with one sub-folder of face images per identity
    #[arg(long = "inputs_path", default_value = "features")]
    pub inputs_path: PathBuf,

    /// File the run log is appended to (its directory must exist)
    #[arg(long = "log_file", default_value = "log.log")]
    pub log_file: PathBuf,

    /// Experiment root; models/ and tensorboard/ are created inside
    #[arg(long = "exps_dir", default_value = "exps")]
    pub exps_dir: PathBuf,

    /// Checkpoint to resume from (epoch_<n>.mpk.gz)
    #[arg(long = "checkpoint")]
    pub checkpoint: Option<PathBuf>,

    #[arg(long = "batch_size", default_value_t = 60)]
    pub batch_size: usize,

    /// Save a checkpoint every N epochs (0 disables)
    #[arg(long = "save_every", default_value_t = 1)]
    pub save_every: usize,

    /// Adam learning rate
    #[arg(long = "lr_base", default_value_t = 0.01)]
    pub lr_base: f64,

    /// Upper bound on batches per epoch
    #[arg(long = "iterations_per_epoch", default_value_t = 20000)]
    pub iterations_per_epoch: usize,

    #[arg(long = "epochs", default_value_t = 2)]
    pub epochs: usize,

    /// facenet-pytorch casia-webface state dict (.pt); downloaded
    /// and cached when not given
    #[arg(long = "pretrained")]
    pub pretrained: Option<PathBuf>,

    /// Directory downloaded weights are cached in
    #[arg(long = "weights_cache")]
    pub weights_cache: Option<PathBuf>,

    /// Start from a randomly initialised backbone instead of pretrained weights
    #[arg(long = "random_init", conflicts_with = "pretrained")]
    pub random_init: bool,

    /// Freeze every backbone parameter before training
    #[arg(long = "freeze_backbone", action = ArgAction::Set, default_value_t = true)]
    pub freeze_backbone: bool,

    /// Side length images are resized to (at least 75)
    #[arg(long = "image_size", default_value_t = 160)]
    pub image_size: usize,

    /// Fraction of images held out for evaluation
    #[arg(long = "val_split", default_value_t = 0.2)]
    pub val_split: f64,

    /// Seed for the split and the loader shuffle
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// DataLoader worker threads
    #[arg(long = "num_workers", default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long = "backend", value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,
}

/// Convert CLI TrainArgs into the application-layer Settings.
/// The application layer never sees clap types.
impl From<TrainArgs> for Settings {
    fn from(a: TrainArgs) -> Self {
        Settings {
            inputs_path:          a.inputs_path,
            log_file:             a.log_file,
            exps_dir:             a.exps_dir,
            checkpoint:           a.checkpoint,
            batch_size:           a.batch_size,
            save_every:           a.save_every,
            lr_base:              a.lr_base,
            iterations_per_epoch: a.iterations_per_epoch,
            epochs:               a.epochs,
            pretrained:           a.pretrained,
            weights_cache:        a.weights_cache,
            random_init:          a.random_init,
            freeze_backbone:      a.freeze_backbone,
            image_size:           a.image_size,
            val_split:            a.val_split,
            seed:                 a.seed,
            num_workers:          a.num_workers,
            backend:              a.backend.into(),
        }
    }
}
