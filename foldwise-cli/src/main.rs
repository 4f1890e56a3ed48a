//! foldwise CLI: run k-fold cross-validation over CSV datasets.

mod commands;

use clap::Parser;
use foldwise_core::PredictionFormat;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// foldwise: parallel cross-validation for classifiers
#[derive(Parser, Debug)]
#[command(name = "foldwise", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Cross-validate a model on a CSV dataset
    Evaluate(EvaluateArgs),
    /// List the available models
    Models,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
pub(crate) struct EvaluateArgs {
    /// CSV file with a header row; the class is the last column by default
    pub dataset: PathBuf,

    /// Model tag (see `foldwise models`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Number of folds, -1 for leave-one-out
    #[arg(short, long, allow_hyphen_values = true)]
    pub folds: Option<i64>,

    /// Seed for fold shuffling
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Worker threads: 1 sequential, n parallel, -1 all cores
    #[arg(short, long, allow_hyphen_values = true)]
    pub threads: Option<i32>,

    /// Evaluate every fold as a separate job, even with one thread
    #[arg(long)]
    pub separate_folds: bool,

    /// Keep summary statistics only
    #[arg(long)]
    pub discard_predictions: bool,

    /// On Ctrl-C, abandon folds that are still running
    #[arg(long)]
    pub no_wait: bool,

    /// Repeat the cross-validation with consecutive seeds
    #[arg(short, long)]
    pub runs: Option<usize>,

    /// Print per-row predictions: plain_text or csv
    #[arg(short, long)]
    pub predictions: Option<PredictionFormat>,

    /// Header name of the class column
    #[arg(long)]
    pub class_column: Option<String>,

    /// Field delimiter
    #[arg(short, long)]
    pub delimiter: Option<char>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write the default configuration to a file
    Init {
        /// Target file (defaults to ./foldwise.toml)
        path: Option<PathBuf>,
    },
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "foldwise", "foldwise")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "foldwise.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, cli.config.as_deref()).await
}
