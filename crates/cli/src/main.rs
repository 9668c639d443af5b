//! AutoProspect sign-in CLI
//!
//! Runs the Google login flow once: loads the cached credential, refreshes
//! it when expired, or walks the user through the browser consent flow.

use anyhow::Result;
use auth::Authenticator;
use clap::Parser;
use common::config::Config;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "autoprospect",
    version,
    about = "Google sign-in for the AutoProspect assistant"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, default_value = "autoprospect.toml")]
    config: PathBuf,

    /// Token cache file, overriding the configuration
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// OAuth client secret file, overriding the configuration
    #[arg(long)]
    client_secret: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(path) = cli.token_file {
        config.token_path = path;
    }
    if let Some(path) = cli.client_secret {
        config.client_secret_path = path;
    }

    println!("--- AutoProspect AI: Google sign-in ---");
    println!("A browser window may open to complete the consent flow.");

    let authenticator = Authenticator::new(&config.token_path, &config.client_secret_path);

    if let Some(credential) = authenticator.login().await? {
        if let (Some(expected), Some(actual)) = (&config.account, &credential.account) {
            if expected != actual {
                warn!(%expected, %actual, "signed-in account differs from the configured one");
            }
        }
    }
    // The missing-client-secret path has already reported itself and is not
    // an error exit.

    Ok(())
}
