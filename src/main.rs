//! codeharvest CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "codeharvest")]
#[command(about = "Function-level dataset extraction from source repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every function under the repository root
    Extract {
        /// Repository to extract (overrides --root)
        #[arg(value_name = "ROOT")]
        path: Option<PathBuf>,

        /// Write the functions to this JSON file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Save a checkpoint every N functions (0 disables)
        #[arg(long, allow_negative_numbers = true)]
        checkpoint: Option<i64>,

        /// Ignore checkpoints left by an interrupted run
        #[arg(long)]
        no_resume: bool,

        /// Key identifiers by file name instead of repository path
        #[arg(long)]
        no_repo: bool,

        /// Start immediately without counting files first
        #[arg(long)]
        lazy: bool,

        /// Always extract this sub-path, even when excluded
        #[arg(long = "only")]
        only: Vec<PathBuf>,

        /// Skip this sub-path
        #[arg(long = "exclude")]
        exclude: Vec<PathBuf>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Inspect or remove extraction checkpoints
    Checkpoints {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// Anonymize symbols in decompiled functions read from a JSON file
    Strip {
        /// JSON array of decompiled functions
        input: PathBuf,

        /// Write the stripped functions here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List registered extractor languages
    Languages,
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// List checkpoint files, oldest first
    List,
    /// Delete every checkpoint file
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "codeharvest={0},codeharvest_core={0},codeharvest_extract={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Extract {
            path,
            out,
            workers,
            checkpoint,
            no_resume,
            no_repo,
            lazy,
            only,
            exclude,
            config,
        } => {
            let overrides = config::ExtractOverrides {
                workers,
                checkpoint,
                no_resume,
                no_repo,
                lazy,
                only,
                exclude,
            };
            commands::extract(path.unwrap_or(cli.root), config, overrides, out).await
        }
        Commands::Checkpoints { action } => match action {
            CheckpointAction::List => commands::list_checkpoints(&cli.root),
            CheckpointAction::Clear => commands::clear_checkpoints(&cli.root),
        },
        Commands::Strip { input, out } => commands::strip(&input, out.as_deref()),
        Commands::Languages => commands::languages(),
        Commands::Version => {
            println!("codeharvest v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
