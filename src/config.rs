//! Configuration loading
//!
//! Reads `config.toml` from the platform config directory, or from the path in
//! `CADENCE_CONFIG`. Every field has a default, so a missing file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::storage::default_data_dir;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Where local tasks are persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory for the task blob; `CADENCE_DATA_DIR` or the platform data dir when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl DataConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Remote document collection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Directory of the file-backed document collection
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Signed-in user whose tasks are read
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Dashboard display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Upcoming tasks shown on the dashboard
    #[serde(default = "default_upcoming_limit")]
    pub upcoming_limit: usize,

    /// Focus minutes reported when the timer total is not passed explicitly
    #[serde(default)]
    pub focus_minutes: u32,
}

fn default_upcoming_limit() -> usize {
    3
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            upcoming_limit: default_upcoming_limit(),
            focus_minutes: 0,
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        std::env::var("CADENCE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
                p.push("cadence");
                p.push("config.toml");
                p
            })
    }

    /// Load configuration from a file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults with a warning if it is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "using default configuration");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dashboard.upcoming_limit == 0 {
            return Err(Error::InvalidConfig(
                "dashboard.upcoming_limit must be at least 1".to_string(),
            ));
        }
        if let Some(user) = &self.remote.user_id {
            if user.trim().is_empty() {
                return Err(Error::InvalidConfig("remote.user_id is empty".to_string()));
            }
        }
        Ok(())
    }
}
