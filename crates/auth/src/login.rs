//! Login orchestration: cached credential, refresh, or interactive consent
//!
//! The single entry point a caller needs. Decides between the three paths
//! from an explicit [`CredentialState`], persists after any mutation, and
//! reports the outcome on standard output.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::REQUIRED_SCOPES;
use crate::credential::{refresh_credential, Credential, CredentialState};
use crate::flow::InstalledFlow;
use crate::secret::ClientSecret;
use crate::storage::TokenStore;

/// Obtains a valid Google credential for the AutoProspect account
pub struct Authenticator {
    token_path: PathBuf,
    client_secret_path: PathBuf,
}

impl Authenticator {
    /// Creates an authenticator over explicit file locations.
    ///
    /// Paths are taken as inputs rather than assumed from the working
    /// directory so callers and tests can isolate their fixtures.
    pub fn new(token_path: impl Into<PathBuf>, client_secret_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            client_secret_path: client_secret_path.into(),
        }
    }

    /// Returns a valid credential, or `None` when the client-secret file
    /// needed for a first sign-in is missing.
    ///
    /// A valid cached credential is returned as-is without touching the
    /// token file. An expired one with a refresh token is refreshed exactly
    /// once and persisted. Anything else goes through the browser consent
    /// flow, whose result is persisted over the token file.
    ///
    /// Lower-level OAuth or network failures propagate as errors; the
    /// missing-client-secret condition is a reported value, not an error.
    pub async fn login(&self) -> Result<Option<Credential>> {
        let store = TokenStore::new(&self.token_path);
        let cached = store.load()?;

        let state = CredentialState::of(cached.as_ref(), REQUIRED_SCOPES);
        debug!(?state, "classified cached credential");

        match (state, cached) {
            (CredentialState::Valid, Some(credential)) => {
                announce(&credential);
                Ok(Some(credential))
            }

            (CredentialState::ExpiredRefreshable, Some(credential)) => {
                let refreshed = refresh_credential(&credential).await?;
                store.save(&refreshed)?;
                announce(&refreshed);
                Ok(Some(refreshed))
            }

            _ => self.consent(&store).await,
        }
    }

    /// Runs the interactive consent flow and persists its result
    async fn consent(&self, store: &TokenStore) -> Result<Option<Credential>> {
        if !self.client_secret_path.exists() {
            report_missing_secret(&self.client_secret_path);
            return Ok(None);
        }

        let secret = ClientSecret::from_file(&self.client_secret_path)?;
        let credential = InstalledFlow::new(secret).run().await?;
        store.save(&credential)?;

        announce(&credential);
        Ok(Some(credential))
    }
}

/// Prints the sign-in confirmation, naming the authenticated account when
/// the credential carries it
fn announce(credential: &Credential) {
    match &credential.account {
        Some(email) => println!("Signed in to Google as: {}", email),
        None => println!("Signed in to Google."),
    }
}

/// The user-facing report for a missing client-secret file
fn report_missing_secret(path: &Path) {
    println!("Error: the client secret file '{}' was not found.", path.display());
    println!("Download it from the Google Cloud console and try again.");
}
