//! Shared HTTP response handling for the REST, auth and places clients.

use reqwest::Response;
use serde_json::Value;

use crate::error::{DomainError, DomainResult};

/// Passes successful responses through; turns anything else into `DomainError::Remote`
pub(crate) async fn ensure_success(response: Response) -> DomainResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DomainError::remote(status.as_u16(), error_message(&body)))
}

/// Picks the human-readable message out of a PostgREST or auth error body
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }
    body.trim().to_string()
}
