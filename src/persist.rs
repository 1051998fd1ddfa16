//! Session Persistence
//!
//! Keeps the auth session in `localStorage` so a reload stays signed in.

use log::warn;
use spotbook_core::Session;
use web_sys::Storage;

const SESSION_KEY: &str = "spotbook.auth.session";

fn storage() -> Option<Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

/// The session saved by an earlier page load, if it still parses
pub fn load_session() -> Option<Session> {
    let raw = storage()?.get_item(SESSION_KEY).ok().flatten()?;
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!("discarding stored session: {e}");
            clear_session();
            None
        }
    }
}

pub fn save_session(session: &Session) {
    let Some(storage) = storage() else { return };
    match serde_json::to_string(session) {
        Ok(raw) => {
            if storage.set_item(SESSION_KEY, &raw).is_err() {
                warn!("could not store the session");
            }
        }
        Err(e) => warn!("could not encode the session: {e}"),
    }
}

pub fn clear_session() {
    if let Some(storage) = storage() {
        let _ = storage.remove_item(SESSION_KEY);
    }
}
