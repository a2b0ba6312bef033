//! Configuration system for Strata.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $STRATA_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/strata/config.toml
//!   3. ~/.config/strata/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::identity::MAX_SLOT_INDEX;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub shards: ShardConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    /// Number of shards (one single-writer scheduler each). 0 = one per core.
    pub count: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Slot capacity of each shard's session pool.
    pub max_slots_per_shard: u32,
    /// Inactivity budget for a new session, in sweep ticks.
    pub default_timeout_ticks: u64,
    /// Seconds between sweep ticks on each shard.
    pub sweep_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            shards: ShardConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self { count: 0 }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_slots_per_shard: 100_000,
            default_timeout_ticks: 30,
            sweep_interval_secs: 60,
        }
    }
}

impl ShardConfig {
    /// Resolve the shard count: explicit value, or one shard per core.
    pub fn effective_count(&self) -> u8 {
        if self.count != 0 {
            return self.count;
        }
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        cores.min(u8::MAX as usize) as u8
    }
}

impl SessionConfig {
    /// Slot capacity clamped to what the 6-digit token field can address.
    pub fn effective_slots(&self) -> u32 {
        self.max_slots_per_shard.min(MAX_SLOT_INDEX + 1).max(1)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("strata")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl StrataConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            StrataConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("STRATA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&StrataConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply STRATA_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("STRATA_SHARDS__COUNT") {
            if let Ok(n) = v.parse() {
                self.shards.count = n;
            }
        }
        if let Ok(v) = std::env::var("STRATA_SESSIONS__MAX_SLOTS_PER_SHARD") {
            if let Ok(n) = v.parse() {
                self.sessions.max_slots_per_shard = n;
            }
        }
        if let Ok(v) = std::env::var("STRATA_SESSIONS__DEFAULT_TIMEOUT_TICKS") {
            if let Ok(n) = v.parse() {
                self.sessions.default_timeout_ticks = n;
            }
        }
        if let Ok(v) = std::env::var("STRATA_SESSIONS__SWEEP_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.sessions.sweep_interval_secs = n;
            }
        }
    }
}
