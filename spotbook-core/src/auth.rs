//! Authentication Client
//!
//! Session-based auth against the backend's GoTrue API. The current session
//! lives in a `watch` channel so the UI can follow sign-in and sign-out; the
//! access token has its own channel for consumers that only need the token.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::config::BackendConfig;
use crate::domain::UserId;
use crate::error::{DomainError, DomainResult};
use crate::http::ensure_success;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub refresh_token: Option<String>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// How long before expiry a session is refreshed
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

impl Session {
    /// Fills in `expires_at` from `expires_in` for a session received at `now`
    fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now.timestamp() + secs);
        }
        self
    }

    /// True once the access token is within [`REFRESH_MARGIN`] of expiring.
    /// A session without an expiry never expires.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_delay(now).is_some_and(|delay| delay.is_zero())
    }

    /// Time left until the session should be refreshed; `None` without an expiry
    /// or a refresh token
    pub fn refresh_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.refresh_token.as_ref()?;
        let due = self.expires_at? - REFRESH_MARGIN.as_secs() as i64;
        Some(Duration::from_secs(due.saturating_sub(now.timestamp()).max(0) as u64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// One entry of the session-change stream
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

/// Result of a sign-up: either signed in right away or waiting on email confirmation
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired(User),
}

#[derive(Clone)]
pub struct AuthClient {
    http: Client,
    config: Arc<BackendConfig>,
    state: Arc<watch::Sender<AuthChange>>,
    tokens: Arc<watch::Sender<Option<String>>>,
}

impl AuthClient {
    pub fn new(config: BackendConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: BackendConfig) -> Self {
        let (state, _) = watch::channel(AuthChange {
            event: AuthEvent::InitialSession,
            session: None,
        });
        let (tokens, _) = watch::channel(None);
        Self {
            http,
            config: Arc::new(config),
            state: Arc::new(state),
            tokens: Arc::new(tokens),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    // ========================
    // Session Queries
    // ========================

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().session.as_ref().map(|s| s.access_token.clone())
    }

    /// Session-change notifications; the receiver starts at the current state
    pub fn subscribe(&self) -> watch::Receiver<AuthChange> {
        self.state.subscribe()
    }

    /// Access-token changes only: sign-in, refresh and sign-out
    pub fn subscribe_tokens(&self) -> watch::Receiver<Option<String>> {
        self.tokens.subscribe()
    }

    /// Installs a session obtained elsewhere
    pub fn set_session(&self, session: Session) {
        self.emit(AuthEvent::SignedIn, Some(session));
    }

    /// Drops the session locally without telling the backend
    pub fn clear_session(&self) {
        self.emit(AuthEvent::SignedOut, None);
    }

    /// Reinstalls a session saved by an earlier page load, refreshing it first
    /// if its access token has expired
    pub async fn restore_session(&self, stored: Session) -> DomainResult<Session> {
        if !stored.is_expired(Utc::now()) {
            debug!("auth: restored session for {}", stored.user.id);
            self.emit(AuthEvent::InitialSession, Some(stored.clone()));
            return Ok(stored);
        }
        let refresh_token = stored.refresh_token.ok_or(DomainError::Unauthenticated)?;
        let session = self.refresh_with(&refresh_token).await?;
        info!("Restored session for {} with a fresh token", session.user.id);
        self.emit(AuthEvent::InitialSession, Some(session.clone()));
        Ok(session)
    }

    /// Time until the current session is due for a refresh
    pub fn next_refresh_in(&self) -> Option<Duration> {
        self.state
            .borrow()
            .session
            .as_ref()
            .and_then(|s| s.refresh_delay(Utc::now()))
    }

    // ========================
    // Remote Operations
    // ========================

    pub async fn sign_up(&self, email: &str, password: &str) -> DomainResult<SignUpOutcome> {
        debug!("auth: sign up {email}");
        let response = self
            .http
            .post(self.config.auth_url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: Value = ensure_success(response).await?.json().await?;

        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<Session>(body)?.stamped(Utc::now());
            self.emit(AuthEvent::SignedIn, Some(session.clone()));
            return Ok(SignUpOutcome::SignedIn(session));
        }
        let user = match body.get("user") {
            Some(user) if !user.is_null() => serde_json::from_value(user.clone())?,
            _ => serde_json::from_value(body)?,
        };
        Ok(SignUpOutcome::ConfirmationRequired(user))
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> DomainResult<Session> {
        debug!("auth: password sign in {email}");
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        info!("Signed in as {}", session.user.id);
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    pub async fn refresh_session(&self) -> DomainResult<Session> {
        let refresh_token = self
            .session()
            .and_then(|s| s.refresh_token)
            .ok_or(DomainError::Unauthenticated)?;
        let session = self.refresh_with(&refresh_token).await?;
        debug!("auth: token refreshed");
        self.emit(AuthEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    async fn refresh_with(&self, refresh_token: &str) -> DomainResult<Session> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Ends the session remotely, then locally. The local session is dropped
    /// even when the remote logout fails; that failure is still returned.
    pub async fn sign_out(&self) -> DomainResult<()> {
        let remote = match self.access_token() {
            Some(token) => self.logout(&token).await,
            None => Ok(()),
        };
        if let Err(e) = &remote {
            warn!("auth: remote sign out failed: {e}");
        }
        info!("Signed out");
        self.emit(AuthEvent::SignedOut, None);
        remote
    }

    async fn logout(&self, token: &str) -> DomainResult<()> {
        let response = self
            .http
            .post(self.config.auth_url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Fetches the current user from the backend
    pub async fn get_user(&self) -> DomainResult<User> {
        let token = self.access_token().ok_or(DomainError::Unauthenticated)?;
        self.fetch_user(&token).await
    }

    /// URL that starts an OAuth sign-in with `provider`
    pub fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> DomainResult<Url> {
        let mut params = vec![("provider", provider)];
        if let Some(redirect) = redirect_to {
            params.push(("redirect_to", redirect));
        }
        Url::parse_with_params(&self.config.auth_url("authorize"), &params)
            .map_err(|e| DomainError::Config(format!("invalid backend url: {e}")))
    }

    /// Completes an OAuth redirect whose URL fragment carries the tokens
    pub async fn session_from_fragment(&self, fragment: &str) -> DomainResult<Session> {
        let params = parse_fragment(fragment)?;
        let find = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        if let Some(description) = find("error_description").or_else(|| find("error")) {
            return Err(DomainError::remote(401, description));
        }
        let access_token = find("access_token").ok_or(DomainError::Unauthenticated)?;
        let user = self.fetch_user(&access_token).await?;
        let session = Session {
            access_token,
            token_type: find("token_type").unwrap_or_else(default_token_type),
            expires_in: find("expires_in").and_then(|v| v.parse().ok()),
            expires_at: find("expires_at").and_then(|v| v.parse().ok()),
            refresh_token: find("refresh_token"),
            user,
        }
        .stamped(Utc::now());
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> DomainResult<Session> {
        let response = self
            .http
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;
        let session: Session = ensure_success(response).await?.json().await?;
        Ok(session.stamped(Utc::now()))
    }

    async fn fetch_user(&self, token: &str) -> DomainResult<User> {
        let response = self
            .http
            .get(self.config.auth_url("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let token = session.as_ref().map(|s| s.access_token.clone());
        self.state.send_replace(AuthChange { event, session });
        self.tokens.send_if_modified(|current| {
            if *current == token {
                return false;
            }
            *current = token;
            true
        });
    }
}

fn parse_fragment(fragment: &str) -> DomainResult<Vec<(String, String)>> {
    let fragment = fragment.trim_start_matches('#');
    let url = Url::parse(&format!("http://localhost/?{fragment}"))
        .map_err(|e| DomainError::Config(format!("invalid redirect fragment: {e}")))?;
    Ok(url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;

    const USER_ID: &str = "00000000-0000-0000-0000-000000000009";

    fn user_json() -> Value {
        json!({ "id": USER_ID, "email": "ada@example.com" })
    }

    fn auth_router() -> Router {
        Router::new()
            .route(
                "/auth/v1/token",
                post(
                    |Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                        let issued = match q.get("grant_type").map(String::as_str) {
                            Some("password") if body["password"] == "hunter2" => Some(("jwt-1", "r-1")),
                            Some("refresh_token") if body["refresh_token"] == "r-1" => Some(("jwt-2", "r-2")),
                            _ => None,
                        };
                        let Some((access, refresh)) = issued else {
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(json!({
                                    "error": "invalid_grant",
                                    "error_description": "Invalid login credentials"
                                })),
                            );
                        };
                        (
                            StatusCode::OK,
                            Json(json!({
                                "access_token": access,
                                "token_type": "bearer",
                                "expires_in": 3600,
                                "refresh_token": refresh,
                                "user": user_json()
                            })),
                        )
                    },
                ),
            )
            .route(
                "/auth/v1/user",
                get(|headers: HeaderMap| async move {
                    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                        Some("Bearer jwt-oauth") => (StatusCode::OK, Json(user_json())),
                        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "bad jwt" }))),
                    }
                }),
            )
            .route("/auth/v1/logout", post(|| async { StatusCode::NO_CONTENT }))
            .route(
                "/auth/v1/signup",
                post(|| async { Json(json!({ "id": USER_ID, "email": "ada@example.com" })) }),
            )
    }

    #[tokio::test]
    async fn test_sign_in_and_out_drive_the_change_stream() {
        let base = serve(auth_router()).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        let mut changes = auth.subscribe();
        assert_eq!(changes.borrow().event, AuthEvent::InitialSession);

        let session = auth.sign_in_with_password("ada@example.com", "hunter2").await.unwrap();
        assert_eq!(session.access_token, "jwt-1");
        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().event, AuthEvent::SignedIn);
        assert_eq!(auth.current_user().unwrap().id.to_string(), USER_ID);

        auth.sign_out().await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().event, AuthEvent::SignedOut);
        assert!(auth.session().is_none());
    }

    fn stored_session(expires_at: i64) -> Session {
        Session {
            access_token: "jwt-old".into(),
            token_type: "bearer".into(),
            expires_in: Some(3600),
            expires_at: Some(expires_at),
            refresh_token: Some("r-1".into()),
            user: serde_json::from_value(user_json()).unwrap(),
        }
    }

    #[test]
    fn test_refresh_delay_keeps_a_margin() {
        let now = Utc::now();
        let session = stored_session(now.timestamp() + 600);
        assert_eq!(
            session.refresh_delay(now),
            Some(Duration::from_secs(600) - REFRESH_MARGIN)
        );
        assert!(!session.is_expired(now));
        assert!(stored_session(now.timestamp() + 30).is_expired(now));

        let mut unbounded = session.clone();
        unbounded.expires_at = None;
        assert_eq!(unbounded.refresh_delay(now), None);
    }

    #[tokio::test]
    async fn test_sign_in_stamps_expiry() {
        let base = serve(auth_router()).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        let before = Utc::now().timestamp();
        let session = auth.sign_in_with_password("ada@example.com", "hunter2").await.unwrap();
        let expires_at = session.expires_at.unwrap();
        assert!(expires_at >= before + 3600);
        assert!(auth.next_refresh_in().unwrap() > Duration::from_secs(3000));
    }

    #[tokio::test]
    async fn test_refresh_replaces_the_token() {
        let base = serve(auth_router()).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        auth.sign_in_with_password("ada@example.com", "hunter2").await.unwrap();
        let mut tokens = auth.subscribe_tokens();
        assert_eq!(tokens.borrow_and_update().as_deref(), Some("jwt-1"));

        let session = auth.refresh_session().await.unwrap();
        assert_eq!(session.refresh_token.as_deref(), Some("r-2"));
        assert_eq!(auth.subscribe().borrow().event, AuthEvent::TokenRefreshed);
        tokens.changed().await.unwrap();
        assert_eq!(tokens.borrow_and_update().as_deref(), Some("jwt-2"));
    }

    #[tokio::test]
    async fn test_restore_keeps_a_live_session() {
        let auth = AuthClient::new(BackendConfig::new("http://127.0.0.1:9", "anon"));
        let stored = stored_session(Utc::now().timestamp() + 3600);
        let restored = auth.restore_session(stored.clone()).await.unwrap();
        assert_eq!(restored, stored);
        assert_eq!(auth.subscribe().borrow().event, AuthEvent::InitialSession);
        assert_eq!(auth.access_token().as_deref(), Some("jwt-old"));
    }

    #[tokio::test]
    async fn test_restore_refreshes_an_expired_session() {
        let base = serve(auth_router()).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        let stored = stored_session(Utc::now().timestamp() - 10);

        let restored = auth.restore_session(stored).await.unwrap();
        assert_eq!(restored.access_token, "jwt-2");
        assert_eq!(auth.access_token().as_deref(), Some("jwt-2"));
    }

    #[tokio::test]
    async fn test_failed_remote_sign_out_still_signs_out_locally() {
        let router = Router::new().route(
            "/auth/v1/logout",
            post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "JWT expired" }))) }),
        );
        let base = serve(router).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        auth.set_session(stored_session(Utc::now().timestamp() + 3600));
        let mut tokens = auth.subscribe_tokens();
        tokens.borrow_and_update();

        let err = auth.sign_out().await.unwrap_err();
        assert!(matches!(err, DomainError::Remote { status: 401, .. }));
        assert!(auth.session().is_none());
        assert_eq!(auth.subscribe().borrow().event, AuthEvent::SignedOut);
        tokens.changed().await.unwrap();
        assert!(tokens.borrow().is_none());
    }

    #[tokio::test]
    async fn test_bad_credentials_leave_session_empty() {
        let base = serve(auth_router()).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        let err = auth.sign_in_with_password("ada@example.com", "nope").await.unwrap_err();
        match err {
            DomainError::Remote { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(auth.session().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_waiting_for_confirmation() {
        let base = serve(auth_router()).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        let outcome = auth.sign_up("ada@example.com", "hunter2").await.unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(ref u) if u.email.as_deref() == Some("ada@example.com")));
        assert!(auth.session().is_none());
    }

    #[tokio::test]
    async fn test_session_from_oauth_fragment() {
        let base = serve(auth_router()).await;
        let auth = AuthClient::new(BackendConfig::new(base, "anon"));
        let session = auth
            .session_from_fragment("#access_token=jwt-oauth&expires_in=3600&refresh_token=r-9&token_type=bearer")
            .await
            .unwrap();
        assert_eq!(session.refresh_token.as_deref(), Some("r-9"));
        assert_eq!(session.expires_in, Some(3600));
        assert_eq!(auth.access_token().as_deref(), Some("jwt-oauth"));
    }

    #[tokio::test]
    async fn test_oauth_fragment_error() {
        let auth = AuthClient::new(BackendConfig::new("http://127.0.0.1:9", "anon"));
        let err = auth
            .session_from_fragment("error=access_denied&error_description=User+cancelled")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Remote { ref message, .. } if message == "User cancelled"));
    }

    #[test]
    fn test_authorize_url() {
        let auth = AuthClient::new(BackendConfig::new("https://abc.example.co", "anon"));
        let url = auth
            .authorize_url("google", Some("http://localhost:5173/"))
            .unwrap();
        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs[0].1, "google");
        assert_eq!(pairs[1].1, "http://localhost:5173/");
    }

    #[tokio::test]
    async fn test_get_user_requires_session() {
        let auth = AuthClient::new(BackendConfig::new("http://127.0.0.1:9", "anon"));
        assert!(matches!(auth.get_user().await, Err(DomainError::Unauthenticated)));
    }
}
