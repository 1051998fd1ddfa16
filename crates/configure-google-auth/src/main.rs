//! `configure-google-auth`: turns on the Google provider for the hosted auth project.
//!
//! Sends a single PATCH to the management API. Credentials come from flags or
//! the environment.
//!
//! # Usage
//!
//! ```text
//! SUPABASE_ACCESS_TOKEN=... GOOGLE_CLIENT_ID=... GOOGLE_CLIENT_SECRET=... configure-google-auth
//! configure-google-auth --project-ref abcd --client-id 123.apps.googleusercontent.com
//! ```

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PROJECT_REF: &str = "wbyfmkrjmpabxxalgxhf";
const DEFAULT_API_URL: &str = "https://api.supabase.com";

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "configure-google-auth",
    version,
    about = "Enable Google OAuth on the hosted auth project"
)]
struct Cli {
    /// Management API token (needs the auth:write scope).
    #[arg(long, env = "SUPABASE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// OAuth client id from the Google Cloud console.
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    client_id: Option<String>,

    /// OAuth client secret; web sign-in does not work without it.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, default_value = DEFAULT_PROJECT_REF)]
    project_ref: String,

    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
enum InputError {
    #[error("SUPABASE_ACCESS_TOKEN is required")]
    MissingAccessToken,
    #[error("GOOGLE_CLIENT_ID is required")]
    MissingClientId,
}

impl InputError {
    fn hint(&self) -> &'static str {
        match self {
            InputError::MissingAccessToken => {
                "Create a token at https://supabase.com/dashboard/account/tokens with the auth:write scope"
            }
            InputError::MissingClientId => {
                "Get the client id from https://console.cloud.google.com/apis/credentials"
            }
        }
    }
}

/// Body of the auth config PATCH
#[derive(Serialize, Debug, PartialEq, Eq)]
struct GoogleAuthConfig {
    external_google_enabled: bool,
    external_google_client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_google_secret: Option<String>,
}

#[derive(Debug)]
struct Plan {
    url: String,
    access_token: String,
    config: GoogleAuthConfig,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Plan {
    fn from_cli(cli: Cli) -> std::result::Result<Self, InputError> {
        let access_token = present(cli.access_token).ok_or(InputError::MissingAccessToken)?;
        let client_id = present(cli.client_id).ok_or(InputError::MissingClientId)?;
        Ok(Self {
            url: format!(
                "{}/v1/projects/{}/config/auth",
                cli.api_url.trim_end_matches('/'),
                cli.project_ref
            ),
            access_token,
            config: GoogleAuthConfig {
                external_google_enabled: true,
                external_google_client_id: client_id,
                external_google_secret: present(cli.client_secret),
            },
        })
    }
}

async fn apply(http: &Client, plan: &Plan) -> Result<()> {
    let response = http
        .patch(&plan.url)
        .bearer_auth(&plan.access_token)
        .json(&plan.config)
        .send()
        .await
        .with_context(|| format!("PATCH {} failed", plan.url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("HTTP {}: {}", status.as_u16(), body);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let plan = match Plan::from_cli(Cli::parse()) {
        Ok(plan) => plan,
        Err(e) => {
            error!("{e}");
            eprintln!("{}", e.hint());
            return ExitCode::FAILURE;
        }
    };
    if plan.config.external_google_secret.is_none() {
        warn!("GOOGLE_CLIENT_SECRET not provided; the web OAuth flow needs it");
    }

    info!("Configuring Google OAuth...");
    match apply(&Client::new(), &plan).await {
        Ok(()) => {
            info!(
                client_id = %plan.config.external_google_client_id,
                "Google OAuth configured"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
