//! shapwise CLI: explain a model prediction with Kernel SHAP.

mod commands;
mod job;
mod settings;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// shapwise: Kernel SHAP feature attributions from the command line
#[derive(Parser, Debug)]
#[command(name = "shapwise", version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to ./shapwise.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for JSON log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Explain the prediction described by a JSON job file
    Explain {
        /// Job file with instance, background and model
        job: PathBuf,

        #[command(flatten)]
        overrides: SettingsArgs,

        /// Print the results as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the effective settings as TOML
    Config {
        #[command(flatten)]
        overrides: SettingsArgs,
    },
}

/// Command-line overrides applied on top of the loaded settings.
#[derive(clap::Args, Debug, Default)]
struct SettingsArgs {
    /// Link function: identity or logit
    #[arg(long)]
    link: Option<String>,

    /// Number of coalitions to evaluate
    #[arg(long)]
    samples: Option<usize>,

    /// Regularizer: none, aic, bic, auto, or a feature count
    #[arg(long)]
    regularizer: Option<String>,

    /// Confidence level of the reported intervals
    #[arg(long)]
    confidence: Option<f64>,

    /// Number of concurrent model batches
    #[arg(long)]
    batches: Option<usize>,

    /// Sampler seed
    #[arg(long)]
    seed: Option<u64>,

    /// Collect counterfactual byproducts
    #[arg(long)]
    counterfactuals: bool,

    /// Abort after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter());

    // JSON file layer, only when a log directory was requested
    let mut _guard = None;
    let json_layer = match &cli.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "shapwise.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            _guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(EnvFilter::new("debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let settings = settings::load_settings(&workspace, cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    commands::handle_command(cli.command, settings).await
}
