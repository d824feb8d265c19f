//! Command-line entrypoint; the actual wiring lives in the library crate.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use conduit::{config, serve, validate};

#[derive(Parser)]
#[command(name = "conduit", version, about = "Local MCP orchestration engine for multi-step, multi-provider AI workflows")]
struct Cli {
    /// Directory holding workflows/, providers/, servers/, skills/, settings.yaml.
    #[arg(long, global = true, env = "CONDUIT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the configured workflows as MCP tools over stdio and/or a Unix socket.
    Serve {
        /// Retry attempts per provider request before failing the step.
        #[arg(long, default_value_t = 3)]
        retry_attempts: u32,
    },
    /// Load the configuration directory and report any errors without serving.
    Validate,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("conduit")
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    conduit_core::init_observability("conduit").ok();
    config::augment_path();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.unwrap_or_else(default_config_dir);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Serve { retry_attempts } => runtime.block_on(serve::run(config_dir, retry_attempts)),
        Command::Validate => validate::run(&config_dir),
    }
}
