//! Replay configuration and config file location.
//!
//! `ReplayConfig` is read from `seqplay.json`. Missing keys take their
//! defaults, a missing file yields `ReplayConfig::default()`.
//!
//! Directory priority:
//! 1. CLI `--config-dir`
//! 2. `SEQPLAY_CONFIG_DIR` environment variable
//! 3. Current directory IF it already holds `seqplay.json`
//! 4. Platform config directory from dirs-next (`~/.config/seqplay` on Linux)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::pacing::Pacing;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "seqplay.json";

/// Environment override for the config directory
pub const CONFIG_DIR_ENV: &str = "SEQPLAY_CONFIG_DIR";

/// What a start request does while another run is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Refuse with `ReplayError::AlreadyRunning`.
    #[default]
    Reject,
    /// Cancel the active run, wait until it is finalized, then start.
    Replace,
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Target duration of a whole run (bounded pacing)
    pub target_total_ms: u64,
    /// Fixed wait after each item; overrides `target_total_ms` when set
    pub fixed_delay_ms: Option<u64>,
    pub start_policy: StartPolicy,
    /// Worker thread name prefix
    pub thread_name: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            target_total_ms: 5000,
            fixed_delay_ms: None,
            start_policy: StartPolicy::Reject,
            thread_name: "seqplay-replay".to_string(),
        }
    }
}

impl ReplayConfig {
    /// Pacing mode described by this config.
    pub fn pacing(&self) -> Pacing {
        match self.fixed_delay_ms {
            Some(ms) => Pacing::FixedPerItem(Duration::from_millis(ms)),
            None => Pacing::Bounded(Duration::from_millis(self.target_total_ms)),
        }
    }

    pub fn with_start_policy(mut self, policy: StartPolicy) -> Self {
        self.start_policy = policy;
        self
    }

    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Parse a config file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}

/// Overrides for the default config location
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI arg → `SEQPLAY_CONFIG_DIR` → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path of a file inside the config directory.
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    config_dir(config).join(name)
}

/// Create the config directory if needed.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let dir = config_dir(config);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    }
    Ok(())
}

fn config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir()
        && current_dir.join(CONFIG_FILE).exists()
    {
        return current_dir;
    }

    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("seqplay");
    }

    PathBuf::from(".")
}
