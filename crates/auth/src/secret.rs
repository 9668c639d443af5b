//! Parsing of the `client_secret.json` document from the Google Cloud console

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::constants::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL};

/// Problems reading or interpreting the client-secret file
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("could not read client secret file: {0}")]
    Io(#[from] std::io::Error),

    #[error("client secret file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("client secret file has neither an \"installed\" nor a \"web\" section")]
    MissingClientSection,
}

/// OAuth client configuration issued by the Google Cloud console.
///
/// The console wraps it in an `installed` object for desktop clients and a
/// `web` object for web clients; both are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,

    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

#[derive(Debug, Deserialize)]
struct SecretDocument {
    #[serde(default)]
    installed: Option<ClientSecret>,
    #[serde(default)]
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Loads the client configuration from a console-downloaded JSON file
    pub fn from_file(path: &Path) -> Result<Self, SecretError> {
        let raw = std::fs::read_to_string(path)?;
        let document: SecretDocument = serde_json::from_str(&raw)?;
        document
            .installed
            .or(document.web)
            .ok_or(SecretError::MissingClientSection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{
                "installed": {
                    "client_id": "id.apps.googleusercontent.com",
                    "project_id": "autoprospect",
                    "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                    "token_uri": "https://oauth2.googleapis.com/token",
                    "client_secret": "secret",
                    "redirect_uris": ["http://localhost"]
                }
            }"#,
        )
        .unwrap();

        let secret = ClientSecret::from_file(&path).unwrap();
        assert_eq!(secret.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secret.project_id.as_deref(), Some("autoprospect"));
        assert_eq!(secret.redirect_uris, vec!["http://localhost"]);
    }

    #[test]
    fn parses_web_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{"web": {"client_id": "id", "client_secret": "secret"}}"#,
        )
        .unwrap();

        let secret = ClientSecret::from_file(&path).unwrap();
        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.auth_uri, GOOGLE_AUTH_URL);
        assert_eq!(secret.token_uri, GOOGLE_TOKEN_URL);
    }

    #[test]
    fn rejects_document_without_client_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(&path, r#"{"other": {}}"#).unwrap();

        assert!(matches!(
            ClientSecret::from_file(&path),
            Err(SecretError::MissingClientSection)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            ClientSecret::from_file(&path),
            Err(SecretError::Io(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            ClientSecret::from_file(&path),
            Err(SecretError::Json(_))
        ));
    }
}
