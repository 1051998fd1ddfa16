//! Auth Commands
//!
//! Sign-in, sign-up and sign-out. Starting and stopping the sync session
//! follows from the auth state change.

use spotbook_core::SignUpOutcome;

use crate::context::AppContext;

pub const GOOGLE_PROVIDER: &str = "google";

pub async fn sign_in(ctx: AppContext, email: &str, password: &str) -> Result<(), String> {
    ctx.auth()
        .sign_in_with_password(email, password)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Returns true when the account still has to be confirmed by email
pub async fn sign_up(ctx: AppContext, email: &str, password: &str) -> Result<bool, String> {
    match ctx.auth().sign_up(email, password).await {
        Ok(SignUpOutcome::SignedIn(_)) => Ok(false),
        Ok(SignUpOutcome::ConfirmationRequired(_)) => Ok(true),
        Err(e) => Err(e.to_string()),
    }
}

pub async fn sign_out(ctx: AppContext) -> Result<(), String> {
    ctx.stop_session();
    ctx.auth().sign_out().await.map_err(|e| e.to_string())
}

/// Sends the browser to the Google consent screen
pub fn sign_in_with_google(ctx: AppContext) -> Result<(), String> {
    let location = web_sys::window().ok_or("no window")?.location();
    let back_to = location.href().map_err(|e| format!("{e:?}"))?;
    let url = ctx
        .auth()
        .authorize_url(GOOGLE_PROVIDER, Some(&back_to))
        .map_err(|e| e.to_string())?;
    location
        .set_href(url.as_str())
        .map_err(|e| format!("{e:?}"))
}

/// Picks up the session the OAuth redirect left in the URL fragment, if any.
/// Returns whether a session was found.
pub async fn complete_oauth_redirect(ctx: AppContext) -> Result<bool, String> {
    let Some(location) = web_sys::window().map(|w| w.location()) else {
        return Ok(false);
    };
    let hash = location.hash().unwrap_or_default();
    let fragment = hash.trim_start_matches('#');
    if !fragment.contains("access_token=") {
        return Ok(false);
    }
    ctx.auth()
        .session_from_fragment(fragment)
        .await
        .map_err(|e| e.to_string())?;
    let _ = location.set_hash("");
    Ok(true)
}
