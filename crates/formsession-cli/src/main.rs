use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "formsession")]
#[command(about = "Form session controller - interactive demo and config tools", long_about = None)]
struct Cli {
    /// Default log filter when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit a sample profile record in a REPL
    Demo {
        /// Form session config file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Enable auto-save with this debounce delay, overriding the config
        #[arg(long)]
        auto_save_ms: Option<u64>,
    },
    /// Inspect form session config files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Parse and validate a config file
    Check { path: PathBuf },
    /// Print the default config as TOML
    PrintDefault,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Demo {
            config,
            auto_save_ms,
        } => commands::demo::run(config, auto_save_ms).await?,
        Commands::Config { action } => match action {
            ConfigAction::Check { path } => commands::config::check(&path).await?,
            ConfigAction::PrintDefault => commands::config::print_default()?,
        },
    }

    Ok(())
}
