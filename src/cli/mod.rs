//! CLI command handlers and utilities

mod commands;
mod logging;

pub use commands::{run_command, Cli, Command, TrainArgs};
pub use logging::{log, LogLevel};
