//! Configuration file handling
//!
//! `Config` is read from YAML at `--config` or
//! `<config_dir>/formfill/config.yaml`. A missing file yields the defaults;
//! browser settings can be overridden from the environment afterwards.

use std::path::{Path, PathBuf};

use action_flow::FlowPolicy;
use action_locator::LocatorPolicy;
use anyhow::{Context, Result};
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use success_monitor::MonitorPolicy;
use tokio::fs;
use tracing::{info, warn};

/// Capacity of the progress/outcome bus when the file does not set one.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub locator: LocatorPolicy,
    pub flow: FlowPolicy,
    pub monitor: MonitorPolicy,
    pub browser: CdpConfig,
    pub bus_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locator: LocatorPolicy::default(),
            flow: FlowPolicy::default(),
            monitor: MonitorPolicy::default(),
            browser: CdpConfig::default(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// False when the defaults were used because no file exists.
    pub from_file: bool,
}

/// `<config_dir>/formfill/config.yaml`
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("formfill");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let (mut config, from_file) = if fs::try_exists(&config_path).await.unwrap_or(false) {
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        info!("Loaded configuration from: {}", config_path.display());
        (config, true)
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        (Config::default(), false)
    };

    config.browser.apply_env();
    config
        .locator
        .validate()
        .with_context(|| format!("invalid locator settings in {}", config_path.display()))?;

    Ok(LoadedConfig {
        config,
        path: config_path,
        from_file,
    })
}

pub async fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let serialized = serde_yaml::to_string(config)?;
    fs::write(path, serialized)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::BudgetMode;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let loaded = load_config(Some(&path)).await.unwrap();
        assert!(!loaded.from_file);
        assert_eq!(loaded.config.locator, LocatorPolicy::default());
        assert_eq!(loaded.config.bus_capacity, DEFAULT_BUS_CAPACITY);
    }

    #[tokio::test]
    async fn partial_sections_keep_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "locator:\n  window_ms: 800\n  budget: whole_chain\nflow:\n  settle_ms: 0\n",
        )
        .unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert!(loaded.from_file);
        assert_eq!(loaded.config.locator.window_ms, 800);
        assert_eq!(loaded.config.locator.poll_interval_ms, 100);
        assert_eq!(loaded.config.locator.budget, BudgetMode::WholeChain);
        assert_eq!(loaded.config.flow.settle_ms, 0);
        assert_eq!(loaded.config.flow.default_wait_ms, 1_000);
        assert_eq!(loaded.config.monitor, MonitorPolicy::default());
    }

    #[tokio::test]
    async fn rejects_zero_poll_interval() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "locator:\n  poll_interval_ms: 0\n").unwrap();
        assert!(load_config(Some(&path)).await.is_err());
    }

    #[tokio::test]
    async fn saved_file_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = Config::default();
        config.monitor.default_timeout_ms = 12_000;
        save_config(&path, &config).await.unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.config.monitor.default_timeout_ms, 12_000);
    }
}
