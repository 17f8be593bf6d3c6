// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the training loop and its
// observers:
//
//   workspace.rs   — experiment directory layout + bootstrap
//   checkpoint.rs  — model weights and config via CompactRecorder
//   metrics.rs     — per-epoch metrics CSV
//   tensorboard.rs — scalar summaries for TensorBoard
//   logging.rs     — tracing subscriber (stdout + log file)
//   weights.rs     — download cache for pretrained weights

/// Experiment directory layout
pub mod workspace;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// TensorBoard event writer
pub mod tensorboard;

/// Process-wide logging setup
pub mod logging;

/// Pretrained weights download cache
pub mod weights;
