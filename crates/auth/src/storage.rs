//! Token cache persistence
//!
//! The credential lives in a single JSON file (by default `token.json` in
//! the working directory), written in Google's authorized-user shape so it
//! is interchangeable with files produced by other Google clients.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::credential::Credential;

/// Reads and writes the on-disk credential cache
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store over the given token file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached credential, if any.
    ///
    /// A missing or corrupt file means "no credential", never a fatal
    /// error; corruption is logged and the file is left for the next save
    /// to overwrite.
    pub fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            debug!("no token file at {}", self.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => {
                debug!("loaded cached credential from {}", self.path.display());
                Ok(Some(credential))
            }
            Err(e) => {
                warn!("token file {} is not a valid credential: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    /// Persists the credential over the token file
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        debug!("saved credential to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{GOOGLE_TOKEN_URL, REQUIRED_SCOPES};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_credential() -> Credential {
        Credential {
            token: "access".into(),
            refresh_token: Some("refresh".into()),
            token_uri: GOOGLE_TOKEN_URL.into(),
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            scopes: REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry: Some(Utc::now() + chrono::Duration::hours(1)),
            account: Some("user@example.com".into()),
        }
    }

    #[test]
    fn missing_file_yields_no_credential() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_yields_no_credential() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("token.json");
        std::fs::write(&path, "{half a credential").unwrap();

        let store = TokenStore::new(&path);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        let credential = test_credential();
        store.save(&credential).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, credential);
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("state/google/token.json"));

        store.save(&test_credential()).unwrap();
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn save_overwrites_previous_credential() {
        let temp = TempDir::new().unwrap();
        let store = TokenStore::new(temp.path().join("token.json"));

        let mut credential = test_credential();
        store.save(&credential).unwrap();

        credential.token = "rotated".into();
        store.save(&credential).unwrap();

        assert_eq!(store.load().unwrap().unwrap().token, "rotated");
    }
}
