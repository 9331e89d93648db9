//! culpar CLI
//!
//! Trains a line-level defect prediction model from a declarative run
//! configuration.
//!
//! # Usage
//!
//! ```bash
//! # Train from a run config
//! culpar train run.yaml
//!
//! # Train with overrides
//! culpar train run.yaml --epochs 10 --lr 0.001
//!
//! # Validate a config
//! culpar validate run.yaml
//!
//! # Summarize the dataset releases a config points at
//! culpar info run.yaml
//! ```

use clap::Parser;
use culpar::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
