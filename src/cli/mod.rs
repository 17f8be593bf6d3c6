// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. `clap` parses the flags,
// they become a `Settings`, and the run is handed to Layer 2 on
// the chosen Burn backend:
//
//   --backend wgpu     → Autodiff<Wgpu>    (default)
//   --backend ndarray  → Autodiff<NdArray>
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod args;

use anyhow::Result;
use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use clap::Parser;

use crate::application::{
    settings::{ComputeBackend, Settings},
    train_use_case::{TrainOutcome, TrainUseCase},
};
use args::TrainArgs;

#[derive(Parser, Debug)]
#[command(
    name = "facenet-finetune",
    version,
    about = "Fine-tune a pretrained InceptionResnetV1 face-embedding network."
)]
pub struct Cli {
    #[command(flatten)]
    pub args: TrainArgs,
}

impl Cli {
    /// Convert the flags and dispatch to the selected backend.
    /// This keeps the CLI layer thin: it only routes.
    pub fn run(self) -> Result<()> {
        let settings: Settings = self.args.into();
        tracing::info!("Fine-tuning on images in: {}", settings.inputs_path.display());

        let backend  = settings.backend;
        let use_case = TrainUseCase::new(settings);

        let outcome = match backend {
            ComputeBackend::Wgpu => {
                use_case.execute::<Autodiff<Wgpu>>(&WgpuDevice::default())?
            }
            ComputeBackend::NdArray => {
                use_case.execute::<Autodiff<NdArray>>(&NdArrayDevice::Cpu)?
            }
        };

        print_summary(&outcome);
        Ok(())
    }
}

fn print_summary(outcome: &TrainOutcome) {
    let report = &outcome.report;
    println!("Training complete: {} epoch(s).", report.epochs.len());
    if let Some(last) = report.last() {
        println!("  final train loss: {:.4}", last.train_loss);
        if let Some(eval) = last.eval {
            println!("  final eval  loss: {:.4}  acc: {:.2}%", eval.loss, eval.accuracy * 100.0);
        }
    }
    if !report.learned {
        println!("  (no trainable parameters: weights were not updated)");
    }
    println!("  checkpoints: {}", outcome.layout.models_dir().display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(argv: &[&str]) -> Settings {
        let mut full = vec!["facenet-finetune"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap().args.into()
    }

    #[test]
    fn test_defaults_match_settings_default() {
        let parsed   = parse(&[]);
        let defaults = Settings::default();

        assert_eq!(parsed.inputs_path, defaults.inputs_path);
        assert_eq!(parsed.log_file, defaults.log_file);
        assert_eq!(parsed.exps_dir, defaults.exps_dir);
        assert_eq!(parsed.checkpoint, None);
        assert_eq!(parsed.batch_size, 60);
        assert_eq!(parsed.save_every, 1);
        assert!((parsed.lr_base - 0.01).abs() < f64::EPSILON);
        assert_eq!(parsed.iterations_per_epoch, 20000);
        assert_eq!(parsed.epochs, 2);
        assert!(parsed.freeze_backbone);
        assert!(!parsed.random_init);
        assert_eq!(parsed.pretrained, None);
        assert_eq!(parsed.image_size, 160);
        assert_eq!(parsed.backend, ComputeBackend::Wgpu);
    }

    #[test]
    fn test_snake_case_flags() {
        let s = parse(&[
            "--exps_dir", "myrun",
            "--epochs", "3",
            "--save_every", "1",
            "--checkpoint", "myrun/models/epoch_2.mpk.gz",
            "--lr_base", "0.001",
            "--freeze_backbone", "false",
            "--backend", "ndarray",
            "--random_init",
        ]);
        assert_eq!(s.exps_dir, PathBuf::from("myrun"));
        assert_eq!(s.epochs, 3);
        assert_eq!(s.checkpoint, Some(PathBuf::from("myrun/models/epoch_2.mpk.gz")));
        assert!((s.lr_base - 0.001).abs() < f64::EPSILON);
        assert!(!s.freeze_backbone);
        assert_eq!(s.backend, ComputeBackend::NdArray);
        assert!(s.random_init);
    }

    #[test]
    fn test_rejects_unknown_flag_and_bad_value() {
        assert!(Cli::try_parse_from(["facenet-finetune", "--batch-size", "4"]).is_err());
        assert!(Cli::try_parse_from(["facenet-finetune", "--batch_size", "abc"]).is_err());
        assert!(Cli::try_parse_from(["facenet-finetune", "--backend", "cuda"]).is_err());
        assert!(Cli::try_parse_from(["facenet-finetune", "--random_init", "--pretrained", "w.pt"]).is_err());
    }
}
