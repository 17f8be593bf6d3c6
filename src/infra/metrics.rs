// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to <exps_dir>/metrics.csv.
//
// Columns:
//   epoch, iterations, train_loss, train_acc, eval_loss, eval_acc
//
// eval_* are left empty for epochs without evaluation, so the
// file still loads cleanly into a spreadsheet or pandas.
//
// Example:
//   epoch,iterations,train_loss,train_acc,eval_loss,eval_acc
//   1,120,4.102311,0.081667,3.998812,0.095000
//   2,120,3.871002,0.123333,,
//
// Resumed runs append to the same file.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use crate::domain::lifecycle::EpochSummary;

const HEADER: &str = "epoch,iterations,train_loss,train_acc,eval_loss,eval_acc";

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's summary as a new row.
    pub fn log(&self, s: &EpochSummary) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let (eval_loss, eval_acc) = match &s.eval {
            Some(e) => (format!("{:.6}", e.loss), format!("{:.6}", e.accuracy)),
            None    => (String::new(), String::new()),
        };

        writeln!(
            f,
            "{},{},{:.6},{:.6},{},{}",
            s.epoch,
            s.iterations,
            s.train_loss,
            s.train_accuracy,
            eval_loss,
            eval_acc,
        )?;

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
