//! Sync Session
//!
//! The per-user context created at sign-in: it subscribes the change feeds,
//! loads the catalog and keeps the store in sync until stopped. Shutting it
//! down leaves the channels and clears the store.

use std::future::Future;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::watch;

use crate::domain::Table;
use crate::error::DomainResult;
use crate::realtime::{RealtimeSession, Transport};
use crate::repository::Backend;
use crate::store::SpotStore;

/// Stops the [`SyncSession`] it was issued with. Dropping it stops the session too.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

pub struct SyncSession<B, T> {
    store: Arc<SpotStore<B>>,
    realtime: RealtimeSession<T>,
    stop: watch::Receiver<bool>,
}

impl<B: Backend, T: Transport> SyncSession<B, T> {
    /// Subscribes both tables, then loads the catalog. Subscribing first means
    /// no change committed after the load is missed.
    pub async fn start(
        store: Arc<SpotStore<B>>,
        transport: T,
        access_token: Option<String>,
    ) -> DomainResult<(Self, StopHandle)> {
        let mut realtime = RealtimeSession::new(transport, access_token);
        realtime.subscribe(Table::Categories).await?;
        realtime.subscribe(Table::Spots).await?;

        if let Err(e) = store.load_categories().await {
            if let Err(close_err) = realtime.close().await {
                warn!("session: closing after failed load: {close_err}");
            }
            return Err(e);
        }

        let (tx, stop) = watch::channel(false);
        info!("session: started");
        Ok((
            Self {
                store,
                realtime,
                stop,
            },
            StopHandle { tx },
        ))
    }

    pub fn store(&self) -> &Arc<SpotStore<B>> {
        &self.store
    }

    /// Passes a refreshed token on to the open channels
    pub async fn set_access_token(&mut self, token: Option<String>) -> DomainResult<()> {
        self.realtime.set_access_token(token).await
    }

    /// Forwards each later token from `tokens` (e.g. [`AuthClient::subscribe_tokens`])
    /// while the session runs
    ///
    /// [`AuthClient::subscribe_tokens`]: crate::auth::AuthClient::subscribe_tokens
    pub fn follow_tokens(&mut self, tokens: watch::Receiver<Option<String>>) {
        self.realtime.follow_tokens(tokens);
    }

    /// Keeps the store in sync until the handle stops the session or the socket
    /// closes, then shuts down. `tick` paces the heartbeats.
    pub async fn run<F, Fut>(mut self, tick: F) -> DomainResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let pumped = self.realtime.run(&*self.store, tick, &mut self.stop).await;
        if let Err(e) = &pumped {
            warn!("session: realtime stopped: {e}");
        }
        let closed = self.shutdown().await;
        pumped.and(closed)
    }

    /// Leaves the channels without touching the store, for a session that was
    /// started but is no longer wanted
    pub async fn abandon(self) -> DomainResult<()> {
        info!("session: abandoned");
        self.realtime.close().await
    }

    /// Leaves the channels and clears the store
    pub async fn shutdown(self) -> DomainResult<()> {
        let closed = self.realtime.close().await;
        self.store.clear();
        info!("session: shut down");
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::{memory_pair, topic_for, ChangeKind, ChangeNotification, Frame};
    use crate::repository::MemoryBackend;
    use crate::store::fixtures::*;

    async fn seeded_store() -> Arc<SpotStore<MemoryBackend>> {
        let backend = MemoryBackend::signed_in(user());
        backend.categories().seed(category(1, "A", 0)).await;
        backend.spots().seed(spot(1, 1, "a1", 0)).await;
        Arc::new(SpotStore::new(backend))
    }

    #[tokio::test]
    async fn test_start_subscribes_then_loads() {
        let store = seeded_store().await;
        let (transport, mut peer) = memory_pair();

        let (_session, _handle) = SyncSession::start(store.clone(), transport, Some("jwt".into()))
            .await
            .unwrap();

        let topics: Vec<_> = peer.sent().into_iter().map(|f| f.topic).collect();
        assert_eq!(topics, [topic_for(Table::Categories), topic_for(Table::Spots)]);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.total_spots(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_releases_channels() {
        let store = seeded_store().await;
        store.backend().set_offline(true);
        let (transport, mut peer) = memory_pair();

        assert!(SyncSession::start(store, transport, None).await.is_err());

        let events: Vec<_> = peer.sent().into_iter().map(|f| f.event).collect();
        assert_eq!(events, ["phx_join", "phx_join", "phx_leave", "phx_leave"]);
    }

    #[tokio::test]
    async fn test_run_syncs_until_stopped_then_clears() {
        let store = seeded_store().await;
        let (transport, mut peer) = memory_pair();
        let (session, handle) = SyncSession::start(store.clone(), transport, None)
            .await
            .unwrap();
        peer.sent();

        let mut observed = store.subscribe();
        observed.borrow_and_update();
        let change = ChangeNotification {
            table: Table::Spots,
            kind: ChangeKind::Delete,
            new: None,
            old: Some(serde_json::json!({ "id": spot_id(1) })),
        };
        peer.push(&Frame::change(&topic_for(Table::Spots), &change)).unwrap();

        let driver = async {
            observed.changed().await.unwrap();
            let spots = observed.borrow_and_update().total_spots();
            handle.stop();
            spots
        };
        let (result, spots_after_delete) =
            tokio::join!(session.run(std::future::pending::<()>), driver);

        result.unwrap();
        assert_eq!(spots_after_delete, 0);
        assert!(store.snapshot().is_empty());
        let events: Vec<_> = peer.sent().into_iter().map(|f| f.event).collect();
        assert_eq!(events, ["phx_leave", "phx_leave"]);
    }

    #[tokio::test]
    async fn test_refreshed_token_reaches_running_channels() {
        use crate::auth::{AuthClient, Session};
        use crate::config::BackendConfig;
        use crate::testing::serve;
        use axum::{routing::post, Json, Router};
        use serde_json::json;

        let router = Router::new().route(
            "/auth/v1/token",
            post(|| async {
                Json(json!({
                    "access_token": "jwt-2",
                    "expires_in": 3600,
                    "refresh_token": "r-2",
                    "user": { "id": "00000000-0000-0000-0000-000000000009" }
                }))
            }),
        );
        let auth = AuthClient::new(BackendConfig::new(serve(router).await, "anon"));
        auth.set_session(Session {
            access_token: "jwt-1".into(),
            token_type: "bearer".into(),
            expires_in: Some(3600),
            expires_at: None,
            refresh_token: Some("r-1".into()),
            user: serde_json::from_value(json!({ "id": "00000000-0000-0000-0000-000000000009" }))
                .unwrap(),
        });

        let store = seeded_store().await;
        let (transport, mut peer) = memory_pair();
        let (mut session, handle) = SyncSession::start(store, transport, auth.access_token())
            .await
            .unwrap();
        session.follow_tokens(auth.subscribe_tokens());
        peer.sent();

        let driver = async {
            auth.refresh_session().await.unwrap();
            let first = peer.next_sent().await.unwrap();
            let second = peer.next_sent().await.unwrap();
            handle.stop();
            [first, second]
        };
        let (result, pushed) = tokio::join!(session.run(std::future::pending::<()>), driver);

        result.unwrap();
        assert!(pushed.iter().all(|f| f.event == "access_token"));
        assert!(pushed.iter().all(|f| f.payload == json!({ "access_token": "jwt-2" })));
        let topics: std::collections::HashSet<_> = pushed.iter().map(|f| f.topic.clone()).collect();
        assert_eq!(topics.len(), 2);
    }

    #[tokio::test]
    async fn test_abandon_keeps_the_store() {
        let store = seeded_store().await;
        let (transport, mut peer) = memory_pair();
        let (session, _handle) = SyncSession::start(store.clone(), transport, None)
            .await
            .unwrap();
        peer.sent();

        session.abandon().await.unwrap();
        assert_eq!(store.total_spots(), 1);
        let events: Vec<_> = peer.sent().into_iter().map(|f| f.event).collect();
        assert_eq!(events, ["phx_leave", "phx_leave"]);
    }

    #[tokio::test]
    async fn test_dropping_the_handle_stops_the_session() {
        let store = seeded_store().await;
        let (transport, _peer) = memory_pair();
        let (session, handle) = SyncSession::start(store.clone(), transport, None)
            .await
            .unwrap();

        drop(handle);
        session.run(std::future::pending::<()>).await.unwrap();
        assert!(store.snapshot().is_empty());
    }
}
