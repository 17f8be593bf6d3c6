// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop only knows about observers through this
// trait, so checkpointing, CSV metrics and TensorBoard output
// can be attached, reordered or removed without touching it.
//
// Implementations:
//   - DefaultModelCallback  → checkpoints + metrics CSV + log lines
//   - TensorBoardCallback   → scalar summaries for TensorBoard

use anyhow::Result;

use crate::domain::lifecycle::TrainingEvent;

// ─── LifecycleObserver ────────────────────────────────────────────────────────
/// Reacts to training lifecycle events.
///
/// Handlers run synchronously on the training thread, in the
/// order observers were registered. Returning an error aborts
/// training; later observers do not see that event.
pub trait LifecycleObserver<M> {
    /// Short name used in log lines and error context
    fn name(&self) -> &str;

    /// Handle one event
    fn on_event(&mut self, event: &TrainingEvent<'_, M>) -> Result<()>;
}
