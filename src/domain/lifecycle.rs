// ============================================================
// Layer 3 — Training Lifecycle
// ============================================================
// The training loop moves through a small set of states and
// announces a closed set of events to registered observers.
//
//   Idle ──TrainBegin──▶ Training ──▶ Evaluating ──▶ Checkpointing
//                          ▲                              │
//                          └──────────── next epoch ──────┘
//
// Every event carries the data an observer needs explicitly,
// so observers never reach back into the trainer.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Where the training loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Training,
    Evaluating,
    Checkpointing,
}

/// Discriminant of [`TrainingEvent`], handy for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TrainBegin,
    IterationEnd,
    EpochEnd,
    Checkpoint,
    TrainEnd,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::TrainBegin   => "train_begin",
            EventKind::IterationEnd => "iteration_end",
            EventKind::EpochEnd     => "epoch_end",
            EventKind::Checkpoint   => "checkpoint",
            EventKind::TrainEnd     => "train_end",
        };
        f.write_str(name)
    }
}

/// Loss and accuracy measured on the evaluation set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub loss:     f64,
    pub accuracy: f64,
    pub samples:  usize,
}

/// Everything measured during one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// Epoch number, 1-based and continuing across resumed runs
    pub epoch: usize,

    /// Mean training loss over the epoch's iterations (NaN when none ran)
    pub train_loss: f64,

    /// Fraction of training samples classified correctly
    pub train_accuracy: f64,

    /// Number of optimisation iterations (batches) in this epoch
    pub iterations: usize,

    /// Present only when evaluation ran this epoch
    pub eval: Option<EvalSummary>,
}

/// An event announced by the training loop.
///
/// `M` is the model type; only [`TrainingEvent::Checkpoint`]
/// hands the model out, and only by shared reference.
#[derive(Debug)]
pub enum TrainingEvent<'a, M> {
    TrainBegin {
        start_epoch: usize,
        epochs:      usize,
    },
    IterationEnd {
        epoch:       usize,
        iteration:   usize,
        global_step: usize,
        loss:        f64,
    },
    EpochEnd {
        summary: &'a EpochSummary,
    },
    Checkpoint {
        epoch: usize,
        model: &'a M,
        dir:   &'a Path,
    },
    TrainEnd {
        epochs_completed: usize,
    },
}

impl<M> TrainingEvent<'_, M> {
    pub fn kind(&self) -> EventKind {
        match self {
            TrainingEvent::TrainBegin { .. }   => EventKind::TrainBegin,
            TrainingEvent::IterationEnd { .. } => EventKind::IterationEnd,
            TrainingEvent::EpochEnd { .. }     => EventKind::EpochEnd,
            TrainingEvent::Checkpoint { .. }   => EventKind::Checkpoint,
            TrainingEvent::TrainEnd { .. }     => EventKind::TrainEnd,
        }
    }
}

/// Whether a checkpoint is due after `epoch`.
/// An interval of zero disables periodic checkpoints.
pub fn checkpoint_due(epoch: usize, save_every: usize) -> bool {
    save_every > 0 && epoch % save_every == 0
}
