//! Configuration management for imagent.
//!
//! Loads configuration from ${IMAGENT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Every field has a default, so a missing config file is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend service. `IMAGENT_BASE_URL` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Timeout for non-streaming requests (login, register), in seconds.
    /// The agent stream has no client-side timeout.
    pub request_timeout_secs: u64,
    /// Default log filter when `IMAGENT_LOG` is not set (e.g. "imagent_core=debug").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 30,
            log_filter: None,
        }
    }
}

impl Config {
    /// Loads the configuration from the default location.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads the configuration from an explicit path.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Timeout to apply to non-streaming requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub mod paths {
    //! Path resolution for imagent configuration and session data.
    //!
    //! IMAGENT_HOME resolution order:
    //! 1. IMAGENT_HOME environment variable (if set)
    //! 2. ~/.config/imagent (default)

    use std::path::PathBuf;

    /// Returns the imagent home directory.
    ///
    /// Checks IMAGENT_HOME env var first, falls back to ~/.config/imagent
    pub fn imagent_home() -> PathBuf {
        if let Ok(home) = std::env::var("IMAGENT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("imagent"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        imagent_home().join("config.toml")
    }
}
