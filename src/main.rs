#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use anyhow::Result;
use cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so queued log lines reach the file
    let _log_guard = infra::logging::init(&cli.args.log_file)?;

    cli.run()
}
