//! Credential model, state classification, and refresh exchange

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::constants::EXPIRY_SKEW_SECS;

/// An OAuth credential in Google's "authorized user" JSON shape.
///
/// This is the exact on-disk format of `token.json`, so a file written by
/// any standard Google client is loadable here and vice versa. The token
/// endpoint and client settings are carried inside the credential, which
/// lets a refresh run without the client-secret file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Short-lived OAuth access token
    pub token: String,

    /// Long-lived refresh token, present when offline access was granted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token endpoint this credential refreshes against
    pub token_uri: String,

    /// OAuth client the credential was issued to
    pub client_id: String,

    /// Client secret paired with `client_id`
    pub client_secret: String,

    /// Scopes granted with this credential
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the access token expires; absent means it does not expire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    /// Email of the authenticated account, when userinfo resolved it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl Credential {
    /// Checks if the access token has expired (with a skew buffer)
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => Utc::now() + chrono::Duration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    /// Checks that every required scope was granted
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope))
    }
}

/// Explicit credential state driving the refresh-vs-reauthorize branch.
///
/// Computed purely from token presence, expiry, scope coverage, and
/// refresh-token presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// No credential on disk
    Absent,
    /// Usable as-is
    Valid,
    /// Expired, but a refresh token can renew it
    ExpiredRefreshable,
    /// Expired or under-scoped with no way back but a new consent
    ExpiredUnrefreshable,
}

impl CredentialState {
    /// Classifies a loaded credential against the required scopes
    pub fn of(credential: Option<&Credential>, required_scopes: &[&str]) -> Self {
        let Some(cred) = credential else {
            return Self::Absent;
        };

        // A refresh never widens the grant, so a narrow scope set means
        // a fresh consent regardless of the refresh token.
        if !cred.has_scopes(required_scopes) {
            return Self::ExpiredUnrefreshable;
        }

        if !cred.token.is_empty() && !cred.is_expired() {
            return Self::Valid;
        }

        if cred.refresh_token.is_some() {
            Self::ExpiredRefreshable
        } else {
            Self::ExpiredUnrefreshable
        }
    }
}

/// Failure modes of the refresh exchange
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("credential has no refresh token")]
    NoRefreshToken,

    #[error("refresh token revoked or expired; run the sign-in flow again")]
    Revoked,

    #[error("token refresh failed: {0}")]
    Rejected(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Response from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Error response from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Exchanges the credential's refresh token for a new access token.
///
/// The request goes to the credential's own `token_uri` with its stored
/// client settings. The refresh token is kept unless the server rotates it;
/// scopes and account carry over.
pub async fn refresh_credential(credential: &Credential) -> Result<Credential, RefreshError> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or(RefreshError::NoRefreshToken)?;

    info!("refreshing expired access token");

    let client = reqwest::Client::new();
    let response = client
        .post(&credential.token_uri)
        .form(&[
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let error_text = response.text().await?;

        if let Ok(error_resp) = serde_json::from_str::<TokenErrorResponse>(&error_text) {
            if error_resp.error == "invalid_grant" {
                return Err(RefreshError::Revoked);
            }
            return Err(RefreshError::Rejected(format!(
                "{} - {}",
                error_resp.error,
                error_resp.error_description.unwrap_or_default()
            )));
        }

        return Err(RefreshError::Rejected(error_text));
    }

    let token_response: TokenResponse = response.json().await?;

    let expiry = Utc::now() + chrono::Duration::seconds(token_response.expires_in);
    let scopes = match token_response.scope {
        Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
        None => credential.scopes.clone(),
    };

    Ok(Credential {
        token: token_response.access_token,
        // Use the rotated refresh token if the server sent one
        refresh_token: token_response
            .refresh_token
            .or_else(|| credential.refresh_token.clone()),
        token_uri: credential.token_uri.clone(),
        client_id: credential.client_id.clone(),
        client_secret: credential.client_secret.clone(),
        scopes,
        expiry: Some(expiry),
        account: credential.account.clone(),
    })
}
