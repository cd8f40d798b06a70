use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use formfill_cli::config::save_config;
use formfill_cli::{Config, LoadedConfig};
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a configuration file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn cmd_config(args: ConfigArgs, loaded: &LoadedConfig) -> Result<()> {
    let path = &loaded.path;
    match args.action {
        ConfigAction::Show => {
            let source = if loaded.from_file {
                path.display().to_string()
            } else {
                format!("defaults; no file at {}", path.display())
            };
            println!("Current configuration ({}):", source);
            println!("{}", serde_yaml::to_string(&loaded.config)?);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            if fs::try_exists(path).await.unwrap_or(false) && !force {
                bail!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            save_config(path, &Config::default()).await?;
            info!("Wrote default configuration");
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
