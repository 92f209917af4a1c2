use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ExplorerConfig;

/// `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => log_filter(level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Accepts a plain level (`debug`) or `EnvFilter` directives
/// (`info,state.registry=debug`).
pub fn log_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level.trim()).with_context(|| format!("Invalid log filter {level:?}"))
}

pub struct LoadedConfig {
    pub config: ExplorerConfig,
    /// `None` when built-in defaults were used.
    pub path: Option<PathBuf>,
}

/// Candidate configuration files, most specific first.
pub fn config_candidates(explicit: Option<&PathBuf>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.clone()];
    }
    // Priority: ./config/explorer.yaml > ~/.config/soulexplorer/config.yaml
    let mut candidates = vec![PathBuf::from("config/explorer.yaml")];
    if let Some(mut path) = dirs::config_dir() {
        path.push("soulexplorer");
        path.push("config.yaml");
        candidates.push(path);
    }
    candidates
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let found = config_candidates(config_path)
        .into_iter()
        .find(|candidate| candidate.exists());

    let mut loaded = match found {
        Some(path) => {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = ExplorerConfig::from_yaml_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            LoadedConfig {
                config,
                path: Some(path),
            }
        }
        None => {
            if let Some(path) = config_path {
                bail!("Config file not found: {}", path.display());
            }
            LoadedConfig {
                config: ExplorerConfig::default(),
                path: None,
            }
        }
    };

    loaded
        .config
        .apply_env_overrides()
        .context("Invalid SOULEXPLORER_* override")?;
    Ok(loaded)
}
