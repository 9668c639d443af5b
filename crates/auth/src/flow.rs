//! OAuth 2.0 installed-application flow with PKCE
//!
//! The interactive consent path for first-time sign-in:
//! 1. Generate PKCE code verifier/challenge
//! 2. Open the browser on Google's authorization page
//! 3. Listen for the OAuth callback on an ephemeral localhost port
//! 4. Exchange the authorization code for tokens

use anyhow::{anyhow, Result};
use axum::{
    extract::Query,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

use crate::constants::*;
use crate::credential::Credential;
use crate::secret::ClientSecret;

/// Generates a cryptographically secure state parameter
fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates PKCE code verifier and challenge
///
/// Returns (verifier, challenge) tuple
fn generate_pkce() -> (String, String) {
    let verifier: [u8; 32] = rand::thread_rng().gen();
    let verifier_str = URL_SAFE_NO_PAD.encode(verifier);

    let mut hasher = Sha256::new();
    hasher.update(verifier_str.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    (verifier_str, challenge)
}

/// Drives the browser-based consent flow for an installed application
pub struct InstalledFlow {
    secret: ClientSecret,
    state: String,
    code_verifier: String,
    code_challenge: String,
}

impl InstalledFlow {
    /// Creates a new flow for the given client with fresh PKCE parameters
    pub fn new(secret: ClientSecret) -> Self {
        let (verifier, challenge) = generate_pkce();
        Self {
            secret,
            state: generate_state(),
            code_verifier: verifier,
            code_challenge: challenge,
        }
    }

    /// Returns the authorization URL to open in the browser
    pub fn authorization_url(&self, redirect_uri: &str) -> String {
        let scopes = REQUIRED_SCOPES.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
            self.secret.auth_uri,
            self.secret.client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            &self.state,
            &self.code_challenge,
        )
    }

    /// Runs the whole consent flow and returns the resulting credential.
    ///
    /// Binds the callback server on an ephemeral port, opens the browser,
    /// blocks until the user completes consent (or the timeout elapses),
    /// then exchanges the authorization code.
    pub async fn run(&self) -> Result<Credential> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow!("Failed to bind local OAuth callback port: {}", e))?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}{}", port, OAUTH_CALLBACK_PATH);

        let url = self.authorization_url(&redirect_uri);
        info!("opening browser for Google consent");
        if open::that(&url).is_err() {
            println!("Open this URL in your browser to continue the sign-in:");
            println!("  {}", url);
        }

        let code = self.wait_for_callback(listener).await?;
        self.exchange_code(&code, &redirect_uri).await
    }

    /// Serves the OAuth callback on the given listener and waits for the redirect
    ///
    /// # Returns
    /// The authorization code from the callback
    pub async fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let expected_state = self.state.clone();
        let (tx, rx) = oneshot::channel::<Result<String>>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let app = Router::new().route(
            OAUTH_CALLBACK_PATH,
            get({
                let tx = tx.clone();
                move |Query(params): Query<CallbackParams>| {
                    let tx = tx.clone();
                    let expected_state = expected_state.clone();
                    async move {
                        // Validate state to prevent CSRF
                        if params.state != expected_state {
                            warn!("OAuth callback received with invalid state");
                            if let Some(tx) = tx.lock().await.take() {
                                let _ = tx.send(Err(anyhow!("Invalid OAuth state parameter")));
                            }
                            return Html(ERROR_HTML).into_response();
                        }

                        // Consent denied or another provider-side error
                        if let Some(error) = params.error {
                            error!("OAuth error: {}", error);
                            if let Some(tx) = tx.lock().await.take() {
                                let _ = tx.send(Err(anyhow!("OAuth error: {}", error)));
                            }
                            return Html(ERROR_HTML).into_response();
                        }

                        let code = match params.code {
                            Some(code) => code,
                            None => {
                                if let Some(tx) = tx.lock().await.take() {
                                    let _ = tx.send(Err(anyhow!("No authorization code in callback")));
                                }
                                return Html(ERROR_HTML).into_response();
                            }
                        };

                        info!("OAuth callback received successfully");
                        if let Some(tx) = tx.lock().await.take() {
                            let _ = tx.send(Ok(code));
                        }

                        Html(SUCCESS_HTML).into_response()
                    }
                }
            }),
        );

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("OAuth callback server error: {}", e);
            }
        });

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(CALLBACK_TIMEOUT_SECS),
            rx,
        )
        .await
        .map_err(|_| anyhow!("OAuth timeout - no callback received within 5 minutes"))?
        .map_err(|_| anyhow!("OAuth callback channel closed unexpectedly"))?;

        server_handle.abort();

        result
    }

    /// Exchanges the authorization code for a credential
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<Credential> {
        info!("exchanging authorization code for tokens");

        let client = reqwest::Client::new();

        let response = client
            .post(&self.secret.token_uri)
            .form(&[
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("code", code),
                ("code_verifier", &self.code_verifier),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("Token exchange failed: {}", error_text));
        }

        let token_response: TokenResponse = response.json().await?;

        let expiry = Utc::now() + chrono::Duration::seconds(token_response.expires_in);
        let scopes = match token_response.scope {
            Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
            None => REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        // The signed-in email is cosmetic; a userinfo failure must not lose
        // an otherwise good credential.
        let account = match fetch_user_email(&token_response.access_token).await {
            Ok(email) => {
                info!("authenticated as {}", email);
                Some(email)
            }
            Err(e) => {
                warn!("could not resolve the signed-in account: {}", e);
                None
            }
        };

        Ok(Credential {
            token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            token_uri: self.secret.token_uri.clone(),
            client_id: self.secret.client_id.clone(),
            client_secret: self.secret.client_secret.clone(),
            scopes,
            expiry: Some(expiry),
            account,
        })
    }
}

/// Fetches the user's email from Google's userinfo endpoint
async fn fetch_user_email(access_token: &str) -> Result<String> {
    #[derive(serde::Deserialize)]
    struct UserInfo {
        email: String,
    }

    let client = reqwest::Client::new();
    let response: UserInfo = client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await?
        .json()
        .await?;

    Ok(response.email)
}

/// Query parameters from OAuth callback
#[derive(serde::Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: String,
    error: Option<String>,
}

/// Token endpoint response
#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// HTML shown on successful OAuth callback
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>AutoProspect - Sign-in Complete</title>
    <style>
        body { font-family: sans-serif; text-align: center; padding-top: 15vh; background: #f4f6f8; color: #1c2733; }
        h1 { font-size: 1.6em; }
        p { color: #5a6b7b; }
    </style>
</head>
<body>
    <h1>Sign-in complete</h1>
    <p>You can close this tab and return to AutoProspect.</p>
</body>
</html>"#;

/// HTML shown on OAuth error
const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>AutoProspect - Sign-in Failed</title>
    <style>
        body { font-family: sans-serif; text-align: center; padding-top: 15vh; background: #f8f4f4; color: #331c1c; }
        h1 { font-size: 1.6em; }
        p { color: #7b5a5a; }
    </style>
</head>
<body>
    <h1>Sign-in failed</h1>
    <p>Something went wrong during authorization. Close this tab and try again.</p>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> ClientSecret {
        ClientSecret {
            client_id: "id.apps.googleusercontent.com".into(),
            client_secret: "secret".into(),
            auth_uri: GOOGLE_AUTH_URL.into(),
            token_uri: GOOGLE_TOKEN_URL.into(),
            project_id: None,
            redirect_uris: vec![],
        }
    }

    #[test]
    fn authorization_url_carries_oauth_parameters() {
        let flow = InstalledFlow::new(test_secret());
        let url = flow.authorization_url("http://127.0.0.1:9999/oauth-callback");

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=id.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A9999%2Foauth-callback"));
        assert!(url.contains("userinfo.email"));
        assert!(url.contains("openid"));
        assert!(url.contains(&format!("state={}", flow.state)));
        assert!(url.contains(&format!("code_challenge={}", flow.code_challenge)));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn pkce_challenge_is_derived_from_verifier() {
        let (verifier, challenge) = generate_pkce();
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        assert_eq!(challenge, URL_SAFE_NO_PAD.encode(hasher.finalize()));
    }

    #[tokio::test]
    async fn callback_returns_code_for_matching_state() {
        let flow = InstalledFlow::new(test_secret());
        let state = flow.state.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move { flow.wait_for_callback(listener).await });

        let url = format!(
            "http://{}{}?state={}&code=auth-code-42",
            addr, OAUTH_CALLBACK_PATH, state
        );
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert!(body.contains("Sign-in complete"));

        let code = handle.await.unwrap().unwrap();
        assert_eq!(code, "auth-code-42");
    }

    #[tokio::test]
    async fn callback_rejects_mismatched_state() {
        let flow = InstalledFlow::new(test_secret());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move { flow.wait_for_callback(listener).await });

        let url = format!(
            "http://{}{}?state=forged&code=auth-code-42",
            addr, OAUTH_CALLBACK_PATH
        );
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert!(body.contains("Sign-in failed"));

        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn callback_surfaces_provider_error() {
        let flow = InstalledFlow::new(test_secret());
        let state = flow.state.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move { flow.wait_for_callback(listener).await });

        let url = format!(
            "http://{}{}?state={}&error=access_denied",
            addr, OAUTH_CALLBACK_PATH, state
        );
        reqwest::get(&url).await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }
}
