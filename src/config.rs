//! Build-time Configuration
//!
//! The browser has no environment, so endpoints and keys are baked in when
//! the bundle is built (`SPOTBOOK_BACKEND_URL=... trunk build`).

use spotbook_core::{BackendConfig, PlacesConfig};

const BACKEND_URL: Option<&str> = option_env!("SPOTBOOK_BACKEND_URL");
const ANON_KEY: Option<&str> = option_env!("SPOTBOOK_ANON_KEY");
const PLACES_KEY: Option<&str> = option_env!("SPOTBOOK_PLACES_KEY");
const PLACES_URL: Option<&str> = option_env!("SPOTBOOK_PLACES_URL");

pub fn backend() -> Result<BackendConfig, String> {
    match (BACKEND_URL, ANON_KEY) {
        (Some(url), Some(key)) => Ok(BackendConfig::new(url, key)),
        _ => Err("Backend not configured: build with SPOTBOOK_BACKEND_URL and SPOTBOOK_ANON_KEY".to_string()),
    }
}

/// Places search needs a key and a proxy URL. The Google web service sends
/// no CORS headers, so a browser cannot call it directly; without either
/// setting the search box is hidden.
pub fn places() -> Option<PlacesConfig> {
    places_from(PLACES_KEY, PLACES_URL)
}

fn places_from(key: Option<&str>, proxy_url: Option<&str>) -> Option<PlacesConfig> {
    Some(PlacesConfig::new(key?).with_base_url(proxy_url?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_places_require_a_proxy() {
        assert!(places_from(Some("key"), None).is_none());
        assert!(places_from(None, Some("https://proxy.example/places")).is_none());

        let config = places_from(Some("key"), Some("https://proxy.example/places")).unwrap();
        assert_eq!(config.base_url, "https://proxy.example/places");
        assert_eq!(config.api_key, "key");
    }
}
