use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration for the sign-in flow.
///
/// Both file locations default to the well-known names in the working
/// directory; an optional TOML file overrides them so tests and callers can
/// isolate their fixtures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the credential cache lives
    pub token_path: PathBuf,

    /// Where the console-downloaded OAuth client configuration lives
    pub client_secret_path: PathBuf,

    /// Account the operator expects to sign in with, for display checks only
    pub account: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            client_secret_path: PathBuf::from("client_secret.json"),
            account: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}
