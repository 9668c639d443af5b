//! Google OAuth 2.0 sign-in for the AutoProspect assistant.
//!
//! Obtains an identity credential for a single Google account: a cached
//! credential is loaded from disk when present, refreshed when expired, and
//! otherwise re-acquired through a browser-based consent flow driven by a
//! client-secret file from the Google Cloud console.

pub mod constants;
pub mod credential;
pub mod flow;
pub mod login;
pub mod secret;
pub mod storage;

pub use credential::{refresh_credential, Credential, CredentialState};
pub use flow::InstalledFlow;
pub use login::Authenticator;
pub use secret::ClientSecret;
pub use storage::TokenStore;
