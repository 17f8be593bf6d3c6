// ============================================================
// Layer 5 — Training Loop
// ============================================================
// `ModelHarness` owns a model plus its registered callbacks and
// runs the epoch loop:
//
//   for each epoch:
//     Training       up to `iterations_per_epoch` batches:
//                    forward → loss → backward → Adam step
//                    → IterationEnd
//     Evaluating     model.valid() over the eval loader
//                    → EpochEnd
//     Checkpointing  every `save_every` epochs → Checkpoint
//
// Key Burn insight:
//   - Training runs on the autodiff backend B
//   - model.valid() gives the same model on B::InnerBackend,
//     so evaluation carries no autodiff overhead
//
// A model whose parameters are all frozen produces a loss that
// does not require grad. The loop then skips backward and the
// optimiser step and only measures loss and accuracy.

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::{marker::PhantomData, path::PathBuf, sync::Arc};

use crate::data::batcher::FaceBatch;
use crate::domain::{
    lifecycle::{checkpoint_due, EpochSummary, EvalSummary, LifecycleState, TrainingEvent},
    traits::LifecycleObserver,
};
use crate::ml::{callbacks::CallbackRegistry, model::ImageClassifier};

/// Loop parameters for one call to [`ModelHarness::fit`].
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Number given to the first epoch; resumed runs continue numbering
    pub start_epoch:          usize,
    pub epochs:               usize,
    pub learning_rate:        f64,
    /// Upper bound on batches per epoch
    pub iterations_per_epoch: usize,
    /// Checkpoint every N epochs; 0 disables checkpoints
    pub save_every:           usize,
    /// Evaluate after every epoch when an eval loader is supplied
    pub evaluate_every:       bool,
    pub checkpoint_dir:       PathBuf,
}

/// What happened during `fit`.
#[derive(Debug, Clone, Default)]
pub struct FitReport {
    pub epochs:      Vec<EpochSummary>,
    pub checkpoints: Vec<usize>,
    /// False when no iteration produced a gradient
    pub learned:     bool,
}

impl FitReport {
    pub fn last(&self) -> Option<&EpochSummary> {
        self.epochs.last()
    }
}

/// A model together with the observers notified while it trains.
pub struct ModelHarness<B: AutodiffBackend, M> {
    model:     M,
    callbacks: CallbackRegistry<M>,
    state:     LifecycleState,
    _backend:  PhantomData<B>,
}

impl<B, M> ModelHarness<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + ImageClassifier<B>,
    M::InnerModule: ImageClassifier<B::InnerBackend>,
{
    pub fn new(model: M) -> Self {
        Self {
            model,
            callbacks: CallbackRegistry::new(),
            state:     LifecycleState::Idle,
            _backend:  PhantomData,
        }
    }

    pub fn register_callback(&mut self, callback: impl LifecycleObserver<M> + 'static) {
        self.callbacks.register(callback);
    }

    /// Move every parameter onto `device`.
    pub fn to_device(mut self, device: &B::Device) -> Self {
        self.model = self.model.to_device(device);
        self
    }

    #[cfg(test)]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[cfg(test)]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn enter(&mut self, state: LifecycleState) {
        if self.state != state {
            tracing::trace!("Lifecycle {:?} → {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Run the epoch loop. Blocks until training finishes or a
    /// callback / the loop itself fails.
    pub fn fit<O: Optimizer<M, B>>(
        &mut self,
        train_iter: Arc<dyn DataLoader<FaceBatch<B>>>,
        eval_iter:  Option<Arc<dyn DataLoader<FaceBatch<B::InnerBackend>>>>,
        criterion:  &CrossEntropyLoss<B>,
        optimizer:  &mut O,
        options:    &FitOptions,
    ) -> Result<FitReport> {
        let end = options.start_epoch.checked_add(options.epochs).with_context(|| {
            format!(
                "Cannot run {} epochs starting at epoch {}: epoch number overflows",
                options.epochs, options.start_epoch
            )
        })?;

        let mut model  = self.model.clone();
        let mut report = FitReport::default();
        let mut global_step  = 0usize;
        let mut warned_frozen = false;

        self.callbacks.dispatch(&TrainingEvent::TrainBegin {
            start_epoch: options.start_epoch,
            epochs:      options.epochs,
        })?;

        for epoch in options.start_epoch..end {
            // ── Training phase ───────────────────────────────────────────────
            self.enter(LifecycleState::Training);

            let mut loss_sum   = 0.0f64;
            let mut iterations = 0usize;
            let mut correct    = 0usize;
            let mut seen       = 0usize;

            for batch in train_iter.iter().take(options.iterations_per_epoch) {
                let n = batch.targets.dims()[0];
                if n == 0 {
                    continue;
                }
                let scores = model.classify(batch.images);

                seen    += n;
                correct += count_correct(scores.clone(), batch.targets.clone());

                let loss = criterion.forward(scores, batch.targets);
                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                // Batch mean weighted by its size, so a short last batch counts less
                loss_sum   += loss_val * n as f64;
                iterations += 1;
                global_step += 1;

                if loss.is_require_grad() {
                    let grads = loss.backward();
                    let grads = GradientsParams::from_grads(grads, &model);
                    model = optimizer.step(options.learning_rate, model, grads);
                    report.learned = true;
                } else if !warned_frozen {
                    tracing::warn!(
                        "Model has no trainable parameters; running forward passes only (no weight updates)"
                    );
                    warned_frozen = true;
                }

                self.callbacks.dispatch(&TrainingEvent::IterationEnd {
                    epoch,
                    iteration: iterations,
                    global_step,
                    loss: loss_val,
                })?;
            }

            if iterations == 0 {
                tracing::warn!("Epoch {} had no training batches", epoch);
            }

            // ── Validation phase ─────────────────────────────────────────────
            // model.valid() → M::InnerModule on B::InnerBackend
            self.enter(LifecycleState::Evaluating);
            let eval = match (&eval_iter, options.evaluate_every) {
                (Some(loader), true) => Some(evaluate(&model.valid(), loader.as_ref())),
                _ => None,
            };

            let summary = EpochSummary {
                epoch,
                train_loss:     if seen > 0 { loss_sum / seen as f64 } else { f64::NAN },
                train_accuracy: if seen > 0 { correct as f64 / seen as f64 } else { 0.0 },
                iterations,
                eval,
            };
            self.callbacks.dispatch(&TrainingEvent::EpochEnd { summary: &summary })?;

            // ── Checkpoint ───────────────────────────────────────────────────
            if checkpoint_due(epoch, options.save_every) {
                self.enter(LifecycleState::Checkpointing);
                self.callbacks.dispatch(&TrainingEvent::Checkpoint {
                    epoch,
                    model: &model,
                    dir:   &options.checkpoint_dir,
                })?;
                report.checkpoints.push(epoch);
            }

            report.epochs.push(summary);
        }

        self.enter(LifecycleState::Idle);
        self.callbacks.dispatch(&TrainingEvent::TrainEnd {
            epochs_completed: report.epochs.len(),
        })?;

        self.model = model;
        Ok(report)
    }
}

/// Per-sample mean loss and accuracy over a whole loader, no gradients.
fn evaluate<B: Backend, M: ImageClassifier<B>>(
    model:  &M,
    loader: &dyn DataLoader<FaceBatch<B>>,
) -> EvalSummary {
    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;
    let mut samples  = 0usize;

    for batch in loader.iter() {
        let n = batch.targets.dims()[0];
        if n == 0 {
            continue;
        }
        let scores = model.classify(batch.images);
        let ce = CrossEntropyLossConfig::new().init(&scores.device());

        samples += n;
        correct += count_correct(scores.clone(), batch.targets.clone());

        loss_sum += ce.forward(scores, batch.targets).into_scalar().elem::<f64>() * n as f64;
    }

    EvalSummary {
        loss:     if samples > 0 { loss_sum / samples as f64 } else { f64::NAN },
        accuracy: if samples > 0 { correct as f64 / samples as f64 } else { 0.0 },
        samples,
    }
}

/// argmax(1) returns [batch, 1]; flatten before comparing with [batch] targets.
fn count_correct<B: Backend>(scores: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = scores.argmax(1).flatten::<1>(0, 1);
    predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}
