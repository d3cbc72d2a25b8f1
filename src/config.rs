use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{alog_debug, Error, Result};

/// Validation visits allowed before the pass edge is forced.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Largest accepted validation cap.
pub const MAX_ITERATIONS_LIMIT: u32 = 100;

/// Upper bound on a single provider call.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// Keep at most this many execution records; oldest are dropped first.
    pub history_limit: Option<usize>,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_step_timeout_secs() -> u64 {
    DEFAULT_STEP_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            history_limit: None,
        }
    }
}

impl Config {
    pub fn archon_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".archon"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::archon_dir()?.join("archon.toml"))
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 || self.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(Error::Validation(format!(
                "max_iterations must be between 1 and {}, got {}",
                MAX_ITERATIONS_LIMIT, self.max_iterations
            )));
        }
        if self.step_timeout_secs == 0 {
            return Err(Error::Validation(
                "step_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        alog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            alog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        alog_debug!(
            "Config loaded: max_iterations={}, step_timeout_secs={}, history_limit={:?}",
            config.max_iterations,
            config.step_timeout_secs,
            config.history_limit
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                alog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        alog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
