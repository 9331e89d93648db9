//! Command dispatch

use super::logging::{log, LogLevel};
use crate::config::RunSpec;
use crate::data::load_release;
use crate::encoder::HashingEncoder;
use crate::train::Trainer;
use crate::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Line-level defect prediction training
#[derive(Parser)]
#[command(name = "culpar", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Train a model from a run configuration
    Train(TrainArgs),

    /// Validate a run configuration without training
    Validate {
        /// Run configuration (YAML)
        config: PathBuf,
    },

    /// Summarize a run's dataset releases
    Info {
        /// Run configuration (YAML)
        config: PathBuf,
    },
}

/// Arguments for the train command
#[derive(Args)]
pub struct TrainArgs {
    /// Run configuration (YAML)
    pub config: PathBuf,

    /// Override the number of epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Override the learning rate
    #[arg(long)]
    pub lr: Option<f32>,

    /// Override the batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load and validate everything, then stop before training
    #[arg(long)]
    pub dry_run: bool,
}

/// Apply command-line overrides on top of the loaded spec
pub(crate) fn apply_overrides(spec: &mut RunSpec, args: &TrainArgs) {
    if let Some(epochs) = args.epochs {
        spec.training.epochs = epochs;
    }
    if let Some(lr) = args.lr {
        spec.optimizer.lr = lr;
    }
    if let Some(batch_size) = args.batch_size {
        spec.training.batch_size = batch_size;
    }
    if let Some(seed) = args.seed {
        spec.training.seed = seed;
    }
}

/// Execute the parsed CLI command
pub fn run_command(cli: Cli) -> Result<()> {
    let level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };

    match cli.command {
        Command::Train(args) => run_train(&args, level),
        Command::Validate { config } => {
            RunSpec::from_yaml_file(&config)?;
            log(level, LogLevel::Normal, "config is valid");
            Ok(())
        }
        Command::Info { config } => run_info(&config, level),
    }
}

fn run_train(args: &TrainArgs, level: LogLevel) -> Result<()> {
    let mut spec = RunSpec::from_yaml_file(&args.config)?;
    apply_overrides(&mut spec, args);
    spec.validate()?;

    log(
        level,
        LogLevel::Normal,
        &format!("training release {} from {}", spec.release, args.config.display()),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  epochs={} batch_size={} lr={} blend_k={} seed={}",
            spec.training.epochs,
            spec.training.batch_size,
            spec.optimizer.lr,
            spec.training.blend_k,
            spec.training.seed
        ),
    );

    if args.dry_run {
        log(level, LogLevel::Normal, "dry run - config validated");
        return Ok(());
    }

    let train = load_release(&spec.data.train, &spec.data)?;
    let valid = load_release(&spec.data.valid, &spec.data)?;
    log(
        level,
        LogLevel::Verbose,
        &format!("  {} training files, {} validation files", train.len(), valid.len()),
    );

    let encoder = HashingEncoder::new(spec.model.embed_dim);
    let mut trainer = Trainer::new(&spec)?;
    let state = trainer.fit(&encoder, &train, &valid)?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "done: best AUC {:.4} at epoch {}",
            state.best_auc, state.best_epoch
        ),
    );
    Ok(())
}

fn run_info(config: &PathBuf, level: LogLevel) -> Result<()> {
    let spec = RunSpec::from_yaml_file(config)?;

    for (phase, path) in [("train", &spec.data.train), ("valid", &spec.data.valid)] {
        let examples = load_release(path, &spec.data)?;
        let defective = examples.iter().filter(|e| e.label == 1.0).count();
        let annotated = examples.iter().filter(|e| e.has_line_annotation()).count();
        let lines: usize = examples.iter().map(|e| e.line_count()).sum();

        log(
            level,
            LogLevel::Normal,
            &format!(
                "{phase}: {} files ({defective} defective, {annotated} line-annotated), {lines} lines",
                examples.len()
            ),
        );
    }
    Ok(())
}
