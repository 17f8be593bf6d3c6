// ============================================================
// Layer 5 — Callbacks
// ============================================================
// The registry the training loop dispatches through, and the
// two observers every run attaches:
//
//   DefaultModelCallback — log line + metrics.csv row per epoch,
//                          weights to disk on each checkpoint event
//   TensorBoardCallback  — per-iteration loss and per-epoch
//                          scalars as TensorBoard events
//
// Dispatch is synchronous and ordered. The first failing
// observer aborts the dispatch and the error reaches `fit`.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::{marker::PhantomData, path::Path};

use crate::domain::{lifecycle::TrainingEvent, traits::LifecycleObserver};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tensorboard::TensorBoardWriter,
};

// ─── CallbackRegistry ─────────────────────────────────────────────────────────
pub struct CallbackRegistry<M> {
    observers: Vec<Box<dyn LifecycleObserver<M>>>,
}

impl<M> Default for CallbackRegistry<M> {
    fn default() -> Self {
        Self { observers: Vec::new() }
    }
}

impl<M> CallbackRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observers are notified in the order they were registered.
    pub fn register(&mut self, observer: impl LifecycleObserver<M> + 'static) {
        tracing::debug!("Registered callback '{}'", observer.name());
        self.observers.push(Box::new(observer));
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.observers.iter().map(|o| o.name()).collect()
    }

    pub fn dispatch(&mut self, event: &TrainingEvent<'_, M>) -> Result<()> {
        for observer in &mut self.observers {
            observer
                .on_event(event)
                .with_context(|| format!("callback '{}' failed on {}", observer.name(), event.kind()))?;
        }
        Ok(())
    }
}

// ─── DefaultModelCallback ─────────────────────────────────────────────────────
/// Progress logging, metrics CSV and checkpoint writing.
///
/// `B` only pins the backend the saved module lives on.
pub struct DefaultModelCallback<B> {
    metrics:  MetricsLogger,
    _backend: PhantomData<B>,
}

impl<B: Backend> DefaultModelCallback<B> {
    /// `metrics_csv` usually lives in the experiment root.
    pub fn new(metrics_csv: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            metrics:  MetricsLogger::new(metrics_csv.as_ref())?,
            _backend: PhantomData,
        })
    }
}

impl<B: Backend, M: Module<B>> LifecycleObserver<M> for DefaultModelCallback<B> {
    fn name(&self) -> &str {
        "default"
    }

    fn on_event(&mut self, event: &TrainingEvent<'_, M>) -> Result<()> {
        match event {
            TrainingEvent::TrainBegin { start_epoch, epochs } => {
                tracing::info!("Training for {} epochs starting at epoch {}", epochs, start_epoch);
            }
            TrainingEvent::IterationEnd { .. } => {}
            TrainingEvent::EpochEnd { summary } => {
                match &summary.eval {
                    Some(eval) => tracing::info!(
                        "Epoch {:>3} | iters={} | train_loss={:.4} | train_acc={:.1}% | eval_loss={:.4} | eval_acc={:.1}%",
                        summary.epoch, summary.iterations, summary.train_loss,
                        summary.train_accuracy * 100.0, eval.loss, eval.accuracy * 100.0,
                    ),
                    None => tracing::info!(
                        "Epoch {:>3} | iters={} | train_loss={:.4} | train_acc={:.1}%",
                        summary.epoch, summary.iterations, summary.train_loss,
                        summary.train_accuracy * 100.0,
                    ),
                }
                self.metrics.log(summary)?;
            }
            TrainingEvent::Checkpoint { epoch, model, dir } => {
                let path = CheckpointManager::new(*dir).save_model::<B, M>(model, *epoch)?;
                tracing::info!("Checkpoint saved for epoch {} → '{}'", epoch, path.display());
            }
            TrainingEvent::TrainEnd { epochs_completed } => {
                tracing::info!("Training complete after {} epochs", epochs_completed);
            }
        }
        Ok(())
    }
}

// ─── TensorBoardCallback ──────────────────────────────────────────────────────
pub struct TensorBoardCallback {
    writer: TensorBoardWriter,
}

impl TensorBoardCallback {
    pub fn new(writer: TensorBoardWriter) -> Self {
        Self { writer }
    }
}

impl<M> LifecycleObserver<M> for TensorBoardCallback {
    fn name(&self) -> &str {
        "tensorboard"
    }

    fn on_event(&mut self, event: &TrainingEvent<'_, M>) -> Result<()> {
        match event {
            TrainingEvent::IterationEnd { global_step, loss, .. } => {
                self.writer.scalar("train/loss", *loss, *global_step);
            }
            TrainingEvent::EpochEnd { summary } => {
                let step = summary.epoch;
                self.writer.scalar("epoch/train_loss", summary.train_loss, step);
                self.writer.scalar("epoch/train_accuracy", summary.train_accuracy, step);
                if let Some(eval) = &summary.eval {
                    self.writer.scalar("epoch/eval_loss", eval.loss, step);
                    self.writer.scalar("epoch/eval_accuracy", eval.accuracy, step);
                }
                self.writer.flush();
            }
            TrainingEvent::TrainEnd { .. } => self.writer.flush(),
            TrainingEvent::TrainBegin { .. } | TrainingEvent::Checkpoint { .. } => {}
        }
        Ok(())
    }
}
