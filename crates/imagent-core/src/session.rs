//! Session token storage and retrieval.
//!
//! The auth token lives in `<home>/session.json` with restricted permissions
//! (0600). The token is opaque to the client; holding one is what
//! "authenticated" means. Tokens are never logged.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

/// Session file name under the imagent home directory.
const SESSION_FILE: &str = "session.json";

/// On-disk shape of the session file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

/// Process-wide session state, hydrated from disk on open and persisted on
/// every mutation.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    token: Option<String>,
}

impl SessionStore {
    /// Returns the default session file path.
    pub fn default_path() -> PathBuf {
        paths::imagent_home().join(SESSION_FILE)
    }

    /// Opens the session store at the default location.
    ///
    /// # Errors
    /// Returns an error if an existing session file cannot be read or parsed.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path())
    }

    /// Opens a session store backed by `path`, hydrating the token if the
    /// file exists.
    ///
    /// # Errors
    /// Returns an error if an existing session file cannot be read or parsed.
    pub fn open(path: PathBuf) -> Result<Self> {
        let token = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session from {}", path.display()))?;
            let file: SessionFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse session from {}", path.display()))?;
            file.token
        } else {
            None
        };

        Ok(Self { path, token })
    }

    /// Returns the stored token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// True iff a token is present.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Stores `token` and persists the session.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn login(&mut self, token: impl Into<String>) -> Result<()> {
        self.token = Some(token.into());
        self.save()
    }

    /// Clears the token and persists the session.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn logout(&mut self) -> Result<()> {
        self.token = None;
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let file = SessionFile {
            token: self.token.clone(),
        };
        let contents = serde_json::to_string_pretty(&file).context("Failed to serialize session")?;

        // Write with restricted permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut out = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            out.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }
}
