// ============================================================
// Layer 6 — TensorBoard Writer
// ============================================================
// Thin owner around tensorboard-rs's SummaryWriter.
//
// The writer buffers events; it is flushed explicitly at the
// end of training and again on drop, so an aborted run still
// leaves readable event files behind.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tensorboard_rs::summary_writer::SummaryWriter;

pub struct TensorBoardWriter {
    inner: SummaryWriter,
}

impl TensorBoardWriter {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        // SummaryWriter panics when it cannot create its event file
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create TensorBoard dir '{}'", dir.display()))?;
        let inner = SummaryWriter::new(dir);
        tracing::debug!("TensorBoard events → '{}'", dir.display());
        Ok(Self { inner })
    }

    /// Record one scalar. Non-finite values are dropped.
    pub fn scalar(&mut self, tag: &str, value: f64, step: usize) {
        if !value.is_finite() {
            tracing::debug!("Skipping non-finite scalar '{}' at step {}", tag, step);
            return;
        }
        self.inner.add_scalar(tag, value as f32, step);
    }

    pub fn flush(&mut self) {
        self.inner.flush();
    }
}

impl Drop for TensorBoardWriter {
    fn drop(&mut self) {
        self.inner.flush();
    }
}
