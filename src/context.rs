//! Application Context
//!
//! Shared services provided via Leptos Context API: the spot store, auth and
//! places clients, and the handle of the running sync session. The session is
//! started on sign-in and stopped on sign-out; the auth session is refreshed
//! before it expires and kept in `localStorage` across reloads.

use std::sync::Arc;
use std::time::Duration;

use gloo_timers::future::sleep;
use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, info, warn};
use spotbook_core::realtime::HEARTBEAT_INTERVAL;
use spotbook_core::{AuthClient, AuthEvent, DomainError, PlacesClient, RestBackend, SpotStore, StopHandle, SyncSession};

use crate::config;
use crate::persist;
use crate::realtime::BrowserSocket;
use crate::store::{store_set_catalog, store_set_error, store_set_user, AppStore, AppStateStoreFields};

pub type Spots = SpotStore<RestBackend>;

/// Wait before retrying a refresh that failed for lack of network
const REFRESH_RETRY: Duration = Duration::from_secs(15);

enum SessionState<H> {
    Idle,
    Starting(u64),
    Running(u64, H),
}

/// Lifecycle of the sync session. Every start gets a new generation; a
/// startup may only install or retire the slot while its generation is current.
struct SessionSlot<H = StopHandle> {
    generation: u64,
    state: SessionState<H>,
}

impl<H> SessionSlot<H> {
    fn new() -> Self {
        Self {
            generation: 0,
            state: SessionState::Idle,
        }
    }

    fn is_idle(&self) -> bool {
        matches!(self.state, SessionState::Idle)
    }

    /// Marks a new startup and returns its generation
    fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.state = SessionState::Starting(self.generation);
        self.generation
    }

    /// Installs the handle of startup `generation`. Hands it back if that
    /// startup was cancelled or superseded.
    fn install(&mut self, generation: u64, handle: H) -> Result<(), H> {
        if !matches!(self.state, SessionState::Starting(current) if current == generation) {
            return Err(handle);
        }
        self.state = SessionState::Running(generation, handle);
        Ok(())
    }

    /// Back to idle, unless a newer startup owns the slot
    fn finish(&mut self, generation: u64) {
        let current = match self.state {
            SessionState::Starting(g) | SessionState::Running(g, _) => g,
            SessionState::Idle => return,
        };
        if current == generation {
            self.state = SessionState::Idle;
        }
    }

    /// Cancels any startup and hands back the running handle
    fn stop(&mut self) -> Option<H> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Running(_, handle) => Some(handle),
            _ => None,
        }
    }
}

struct Services {
    store: Arc<Spots>,
    auth: AuthClient,
    places: Option<PlacesClient>,
}

/// App-wide services provided via context
#[derive(Clone, Copy)]
pub struct AppContext {
    services: StoredValue<Services, LocalStorage>,
    session: StoredValue<SessionSlot, LocalStorage>,
    app: AppStore,
}

impl AppContext {
    pub fn new(app: AppStore) -> Result<Self, String> {
        let auth = AuthClient::new(config::backend()?);
        let store = Arc::new(SpotStore::new(RestBackend::new(auth.clone())));
        let places = config::places().map(PlacesClient::new);

        let ctx = Self {
            services: StoredValue::new_local(Services { store, auth, places }),
            session: StoredValue::new_local(SessionSlot::new()),
            app,
        };
        ctx.mirror_store();
        ctx.follow_auth();
        ctx.keep_session_fresh();
        ctx.restore_session();
        Ok(ctx)
    }

    pub fn store(&self) -> Arc<Spots> {
        self.services.with_value(|s| s.store.clone())
    }

    pub fn auth(&self) -> AuthClient {
        self.services.with_value(|s| s.auth.clone())
    }

    pub fn places(&self) -> Option<PlacesClient> {
        self.services.with_value(|s| s.places.clone())
    }

    pub fn app(&self) -> AppStore {
        self.app
    }

    /// Copies every catalog and loading change into the reactive store
    fn mirror_store(&self) {
        let store = self.store();
        let app = self.app;

        let mut catalog = store.subscribe();
        spawn_local(async move {
            loop {
                let snapshot = catalog.borrow_and_update().clone();
                store_set_catalog(&app, &snapshot);
                if catalog.changed().await.is_err() {
                    break;
                }
            }
        });

        let mut loading = store.subscribe_loading();
        spawn_local(async move {
            loop {
                let value = *loading.borrow_and_update();
                app.loading().set(value);
                if loading.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// Starts a session on sign-in and stops it on sign-out. Every change is
    /// also written to storage.
    fn follow_auth(&self) {
        let ctx = *self;
        let mut changes = self.auth().subscribe();
        spawn_local(async move {
            loop {
                let change = changes.borrow_and_update().clone();
                store_set_user(&ctx.app, change.user());
                match &change.session {
                    Some(session) => {
                        persist::save_session(session);
                        ctx.start_session();
                    }
                    None => {
                        // The initial empty state must not wipe a session still being restored
                        if change.event == AuthEvent::SignedOut {
                            persist::clear_session();
                        }
                        ctx.stop_session();
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// Picks up the session an earlier page load left in storage
    fn restore_session(&self) {
        let Some(stored) = persist::load_session() else { return };
        let auth = self.auth();
        spawn_local(async move {
            match auth.restore_session(stored).await {
                Ok(_) => {}
                Err(DomainError::Http(e)) => {
                    warn!("could not restore the session, keeping it for the next load: {e}");
                }
                Err(e) => {
                    warn!("stored session is no longer valid: {e}");
                    persist::clear_session();
                }
            }
        });
    }

    /// Refreshes the auth session shortly before its token expires
    fn keep_session_fresh(&self) {
        let ctx = *self;
        let mut changes = self.auth().subscribe();
        spawn_local(async move {
            loop {
                changes.borrow_and_update();
                let due = ctx.auth().next_refresh_in();
                let refresh_due = async move {
                    match due {
                        Some(delay) => sleep(delay).await,
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    biased;
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = refresh_due => ctx.refresh_now().await,
                }
            }
        });
    }

    async fn refresh_now(&self) {
        debug!("refreshing auth session");
        match self.auth().refresh_session().await {
            Ok(_) => {}
            // Rejected refresh token: the session is over
            Err(DomainError::Remote { status, message }) if (400..500).contains(&status) => {
                warn!("session refresh rejected ({status}): {message}");
                self.auth().clear_session();
                store_set_error(&self.app, "Your session expired, please sign in again");
            }
            Err(e) => {
                warn!("session refresh failed, retrying: {e}");
                sleep(REFRESH_RETRY).await;
            }
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.with_value(|slot| !slot.is_idle())
    }

    /// Connects the realtime socket and runs a sync session until stopped
    pub fn start_session(&self) {
        if self.has_session() {
            return;
        }
        let mut generation = 0;
        self.session.update_value(|slot| generation = slot.begin());
        let ctx = *self;
        spawn_local(async move {
            let auth = ctx.auth();
            let url = auth.config().realtime_url();
            let started = match BrowserSocket::connect(&url).await {
                Ok(socket) => SyncSession::start(ctx.store(), socket, auth.access_token()).await,
                Err(e) => Err(e),
            };
            let mut session = match started {
                Ok((session, handle)) => {
                    let mut installed = Ok(());
                    ctx.session
                        .update_value(|slot| installed = slot.install(generation, handle));
                    if installed.is_err() {
                        // Cancelled or superseded while connecting
                        if let Err(e) = session.abandon().await {
                            warn!("closing superseded session: {e}");
                        }
                        return;
                    }
                    session
                }
                Err(e) => {
                    warn!("sync session failed to start: {e}");
                    store_set_error(&ctx.app, format!("Could not load your spots: {e}"));
                    ctx.session.update_value(|slot| slot.finish(generation));
                    return;
                }
            };
            session.follow_tokens(auth.subscribe_tokens());
            info!("sync session {generation} running");
            if let Err(e) = session.run(|| sleep(HEARTBEAT_INTERVAL)).await {
                store_set_error(&ctx.app, format!("Live updates stopped: {e}"));
            }
            ctx.session.update_value(|slot| slot.finish(generation));
        });
    }

    /// Stops the running session; its shutdown clears the store
    pub fn stop_session(&self) {
        let mut handle = None;
        self.session.update_value(|slot| handle = slot.stop());
        if let Some(handle) = handle {
            handle.stop();
        }
        self.store().clear();
    }
}

pub fn use_app_context() -> AppContext {
    expect_context::<AppContext>()
}
