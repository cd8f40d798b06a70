use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

mod cli;

use cli::bridge::{cmd_bridge, BridgeArgs};
use cli::config::{cmd_config, ConfigArgs};
use cli::info::cmd_info;
use cli::run::{cmd_run, RunArgs};
use cli::runtime::init_logging;
use cli::validate::{cmd_validate, ValidateArgs};
use cli::OutputFormat;
use formfill_cli::config::load_config;

/// FormFill - replay recorded form mappings with spreadsheet rows
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill the mapping's form once per CSV row
    Run(RunArgs),

    /// Check a mapping file without opening a browser
    Validate(ValidateArgs),

    /// Serve JSON-lines engine requests on stdin/stdout
    Bridge(BridgeArgs),

    /// Inspect or create the configuration file
    Config(ConfigArgs),

    /// Show build and environment information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_json)?;
    info!("Starting FormFill v{}", env!("CARGO_PKG_VERSION"));

    let loaded = load_config(cli.config.as_deref()).await?;

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args, &loaded.config, cli.output).await,
        Commands::Validate(args) => cmd_validate(args, cli.output).await,
        Commands::Bridge(args) => cmd_bridge(args, &loaded.config).await,
        Commands::Config(args) => cmd_config(args, &loaded).await,
        Commands::Info => cmd_info(&loaded).await,
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
