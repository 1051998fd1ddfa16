//! Client Configuration
//!
//! Backend project and places API settings, loadable from the environment.

use std::env;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::domain::Table;
use crate::error::{DomainError, DomainResult};

pub const BACKEND_URL_VAR: &str = "SPOTBOOK_BACKEND_URL";
pub const ANON_KEY_VAR: &str = "SPOTBOOK_ANON_KEY";
pub const PLACES_KEY_VAR: &str = "SPOTBOOK_PLACES_KEY";
pub const PLACES_URL_VAR: &str = "SPOTBOOK_PLACES_URL";

/// Google's endpoint; reachable from native clients only, as it answers
/// without CORS headers
const DEFAULT_PLACES_URL: &str = "https://maps.googleapis.com/maps/api/place";

/// Hosted backend project (REST, auth and realtime share one base URL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    pub fn from_env() -> DomainResult<Self> {
        Ok(Self::new(var(BACKEND_URL_VAR)?, var(ANON_KEY_VAR)?))
    }

    pub fn rest_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.url, table.as_str())
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path.trim_start_matches('/'))
    }

    /// Phoenix websocket endpoint, with the scheme switched to ws/wss
    pub fn realtime_url(&self) -> String {
        let base = if let Some(rest) = self.url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.url.clone()
        };
        format!(
            "{base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.anon_key
        )
    }
}

/// Places web service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacesConfig {
    pub api_key: String,
    #[serde(default = "default_places_url")]
    pub base_url: String,
}

impl PlacesConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_places_url(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn from_env() -> DomainResult<Self> {
        let config = Self::new(var(PLACES_KEY_VAR)?);
        Ok(match env::var(PLACES_URL_VAR) {
            Ok(url) => config.with_base_url(url),
            Err(_) => {
                info!("{PLACES_URL_VAR} not set, using default: {DEFAULT_PLACES_URL}");
                config
            }
        })
    }
}

fn default_places_url() -> String {
    DEFAULT_PLACES_URL.to_string()
}

fn var(key: &str) -> DomainResult<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => {
            warn!("Environment variable {key} not found");
            Err(DomainError::Config(format!("{key} is required")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let config = BackendConfig::new("https://abc.example.co/", "anon");
        assert_eq!(config.url, "https://abc.example.co");
        assert_eq!(
            config.rest_url(Table::Spots),
            "https://abc.example.co/rest/v1/spots"
        );
        assert_eq!(
            config.auth_url("/token"),
            "https://abc.example.co/auth/v1/token"
        );
        assert_eq!(
            config.realtime_url(),
            "wss://abc.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn test_realtime_url_plain_http() {
        let config = BackendConfig::new("http://127.0.0.1:54321", "k");
        assert!(config.realtime_url().starts_with("ws://127.0.0.1:54321/realtime"));
    }

    #[test]
    fn test_places_config_defaults_base_url() {
        let config: PlacesConfig = serde_json::from_str(r#"{"api_key":"key"}"#).unwrap();
        assert_eq!(config.base_url, DEFAULT_PLACES_URL);
        let custom = PlacesConfig::new("key").with_base_url("http://localhost:9000/");
        assert_eq!(custom.base_url, "http://localhost:9000");
    }
}
