//! Fixed endpoints, scopes, and file names for the Google sign-in flow.

/// Scopes requested for the AutoProspect account. Fixed, not configurable.
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/userinfo.email",
    "openid",
];

/// Google OAuth authorization endpoint
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth token exchange endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google userinfo endpoint for resolving the signed-in email
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Path the local callback server answers on
pub const OAUTH_CALLBACK_PATH: &str = "/oauth-callback";

/// How long the interactive flow waits for the browser callback
pub const CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Access tokens within this window of their expiry are treated as expired
pub const EXPIRY_SKEW_SECS: i64 = 300;

/// Default token cache file name in the working directory
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Default client-secret file name in the working directory
pub const DEFAULT_CLIENT_SECRET_FILE: &str = "client_secret.json";
