// ============================================================
// Layer 6 — Logging
// ============================================================
// Installs the process-wide tracing subscriber: human-readable
// output on stdout plus a plain-text copy in the log file.
//
// File writes go through tracing-appender's background worker.
// The returned guard must live until the process exits; dropping
// it flushes whatever is still queued.

use anyhow::{Context, Result};
use std::{fs::OpenOptions, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "facenet_finetune=info";

/// Keeps the file writer alive
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Initialise logging. The log file's directory must already exist.
pub fn init(log_file: &Path) -> Result<LogGuard> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Cannot open log file '{}'", log_file.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::from_default_env().add_directive(DEFAULT_DIRECTIVE.parse()?);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}
