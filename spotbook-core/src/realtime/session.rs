//! Realtime Session
//!
//! Owns the channel subscriptions on one socket and pumps decoded change
//! notifications into a [`SpotStore`]. At most one channel per table is live;
//! subscribing a table again leaves the previous channel first.

use std::collections::HashMap;
use std::future::Future;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::domain::Table;
use crate::error::{DomainError, DomainResult};
use crate::repository::Backend;
use crate::store::SpotStore;
use super::protocol::{topic_for, ChangeNotification, Frame, Inbound};
use super::transport::Transport;

struct Channel {
    topic: String,
    join_ref: String,
}

pub struct RealtimeSession<T> {
    transport: T,
    channels: HashMap<Table, Channel>,
    next_ref: u64,
    access_token: Option<String>,
    tokens: Option<watch::Receiver<Option<String>>>,
}

/// What woke the pump
enum Wake {
    StopChanged(bool),
    /// `None` once the token source is gone
    Token(Option<Option<String>>),
    Frame(Option<DomainResult<String>>),
    Tick,
}

/// Next value of the token source; pends forever without one
async fn next_token(tokens: &mut Option<watch::Receiver<Option<String>>>) -> Option<Option<String>> {
    let Some(rx) = tokens else {
        return std::future::pending().await;
    };
    match rx.changed().await {
        Ok(()) => Some(rx.borrow_and_update().clone()),
        Err(_) => None,
    }
}

impl<T: Transport> RealtimeSession<T> {
    pub fn new(transport: T, access_token: Option<String>) -> Self {
        Self {
            transport,
            channels: HashMap::new(),
            next_ref: 0,
            access_token,
            tokens: None,
        }
    }

    /// Pushes every later value of `tokens` to the open channels while running
    pub fn follow_tokens(&mut self, mut tokens: watch::Receiver<Option<String>>) {
        tokens.borrow_and_update();
        self.tokens = Some(tokens);
    }

    fn make_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    async fn send(&mut self, frame: Frame) -> DomainResult<()> {
        self.transport.send(frame.encode()?).await
    }

    pub fn is_subscribed(&self, table: Table) -> bool {
        self.channels.contains_key(&table)
    }

    // ========================
    // Channels
    // ========================

    /// Joins the change feed of `table`, replacing any existing channel for it
    pub async fn subscribe(&mut self, table: Table) -> DomainResult<()> {
        if self.unsubscribe(table).await? {
            debug!("realtime: replacing channel for {table}");
        }
        let join_ref = self.make_ref();
        let frame = Frame::join(table, &join_ref, self.access_token.as_deref());
        self.send(frame).await?;
        self.channels.insert(
            table,
            Channel {
                topic: topic_for(table),
                join_ref,
            },
        );
        info!("realtime: subscribed to {table}");
        Ok(())
    }

    /// Leaves the channel of `table`. Returns whether one was open.
    pub async fn unsubscribe(&mut self, table: Table) -> DomainResult<bool> {
        let Some(channel) = self.channels.remove(&table) else {
            return Ok(false);
        };
        let reference = self.make_ref();
        self.send(Frame::leave(&channel.topic, &reference, &channel.join_ref))
            .await?;
        debug!("realtime: left {}", channel.topic);
        Ok(true)
    }

    /// Swaps the token used for new joins and pushes it to every open channel
    pub async fn set_access_token(&mut self, token: Option<String>) -> DomainResult<()> {
        self.access_token = token;
        let Some(token) = self.access_token.clone() else {
            return Ok(());
        };
        let channels: Vec<(String, String)> = self
            .channels
            .values()
            .map(|c| (c.topic.clone(), c.join_ref.clone()))
            .collect();
        for (topic, join_ref) in channels {
            let reference = self.make_ref();
            self.send(Frame::access_token(&topic, &token, &reference, &join_ref))
                .await?;
        }
        Ok(())
    }

    pub async fn heartbeat(&mut self) -> DomainResult<()> {
        let reference = self.make_ref();
        self.send(Frame::heartbeat(&reference)).await
    }

    // ========================
    // Inbound
    // ========================

    /// Waits for the next change on a subscribed table. `None` once the socket closes.
    pub async fn next_change(&mut self) -> DomainResult<Option<ChangeNotification>> {
        while let Some(text) = self.transport.recv().await {
            if let Some(change) = self.handle_frame(&text?)? {
                return Ok(Some(change));
            }
        }
        Ok(None)
    }

    /// Classifies one text frame. Malformed frames, frames for other topics and
    /// lifecycle frames of an earlier join are skipped; a rejected join or a
    /// closed channel is an error.
    fn handle_frame(&self, text: &str) -> DomainResult<Option<ChangeNotification>> {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("realtime: skipping malformed frame: {e}");
                return Ok(None);
            }
        };
        let Some(channel) = self.channels.values().find(|c| c.topic == frame.topic) else {
            return Ok(None);
        };
        // Lifecycle frames of a replaced join share the topic of its successor
        let stale = frame.is_lifecycle()
            && frame
                .join_ref
                .as_deref()
                .is_some_and(|join_ref| join_ref != channel.join_ref);
        if stale {
            debug!("realtime: dropping stale {} on {}", frame.event, frame.topic);
            return Ok(None);
        }
        let topic = frame.topic.clone();

        let inbound = match Inbound::classify(frame) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("realtime: skipping frame on {topic}: {e}");
                return Ok(None);
            }
        };
        match inbound {
            Inbound::Change(change) => {
                let ours = self
                    .channels
                    .get(&change.table)
                    .is_some_and(|c| c.topic == topic);
                Ok(ours.then_some(change))
            }
            Inbound::Reply { status, response, .. } if status == "error" => Err(
                DomainError::Realtime(format!("{topic} rejected: {response}")),
            ),
            Inbound::Reply { status, .. } => {
                debug!("realtime: {topic} reply {status}");
                Ok(None)
            }
            Inbound::ChannelDown { event, reason } => Err(DomainError::Realtime(format!(
                "{topic} went down ({event}): {reason}"
            ))),
            Inbound::Other { event } => {
                debug!("realtime: ignoring {event} on {topic}");
                Ok(None)
            }
        }
    }

    // ========================
    // Pump
    // ========================

    /// Merges incoming changes into `store` and sends a heartbeat each time
    /// `tick()` fires, until `stop` turns true (or its sender is dropped) or
    /// the socket closes. A change that fails to merge is logged and dropped.
    /// Token updates from [`follow_tokens`](Self::follow_tokens) are forwarded.
    pub async fn run<B, F, Fut>(
        &mut self,
        store: &SpotStore<B>,
        mut tick: F,
        stop: &mut watch::Receiver<bool>,
    ) -> DomainResult<()>
    where
        B: Backend,
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        if *stop.borrow_and_update() {
            return Ok(());
        }
        let mut timer = Box::pin(tick());

        loop {
            let wake = tokio::select! {
                biased;
                changed = stop.changed() => Wake::StopChanged(changed.is_err()),
                token = next_token(&mut self.tokens) => Wake::Token(token),
                frame = self.transport.recv() => Wake::Frame(frame),
                () = &mut timer => Wake::Tick,
            };

            match wake {
                Wake::StopChanged(dropped) => {
                    if dropped || *stop.borrow_and_update() {
                        debug!("realtime: stop requested");
                        return Ok(());
                    }
                }
                Wake::Token(None) => self.tokens = None,
                Wake::Token(Some(token)) => {
                    if token != self.access_token {
                        debug!("realtime: forwarding refreshed token");
                        self.set_access_token(token).await?;
                    }
                }
                Wake::Frame(None) => {
                    info!("realtime: socket closed");
                    return Ok(());
                }
                Wake::Frame(Some(text)) => {
                    if let Some(change) = self.handle_frame(&text?)? {
                        if let Err(e) = store.apply_change(&change) {
                            warn!("realtime: dropped {:?} on {}: {e}", change.kind, change.table);
                        }
                    }
                }
                Wake::Tick => {
                    self.heartbeat().await?;
                    timer = Box::pin(tick());
                }
            }
        }
    }

    /// Leaves every channel and closes the socket
    pub async fn close(mut self) -> DomainResult<()> {
        let tables: Vec<Table> = self.channels.keys().copied().collect();
        for table in tables {
            self.unsubscribe(table).await?;
        }
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::realtime::{memory_pair, ChangeKind, MemoryPeer, MemoryTransport};
    use crate::repository::MemoryBackend;
    use crate::store::fixtures::*;

    fn insert_category(n: u128, name: &str) -> ChangeNotification {
        ChangeNotification {
            table: Table::Categories,
            kind: ChangeKind::Insert,
            new: Some(serde_json::to_value(category(n, name, n as i32)).unwrap()),
            old: None,
        }
    }

    async fn subscribed() -> (RealtimeSession<MemoryTransport>, MemoryPeer) {
        let (transport, mut peer) = memory_pair();
        let mut session = RealtimeSession::new(transport, Some("jwt".into()));
        session.subscribe(Table::Categories).await.unwrap();
        session.subscribe(Table::Spots).await.unwrap();
        peer.sent();
        (session, peer)
    }

    #[tokio::test]
    async fn test_resubscribe_leaves_previous_channel() {
        let (transport, mut peer) = memory_pair();
        let mut session = RealtimeSession::new(transport, None);

        session.subscribe(Table::Spots).await.unwrap();
        session.subscribe(Table::Spots).await.unwrap();

        let frames = peer.sent();
        let events: Vec<_> = frames.iter().map(|f| f.event.as_str()).collect();
        assert_eq!(events, ["phx_join", "phx_leave", "phx_join"]);
        assert_eq!(frames[1].join_ref, frames[0].join_ref);
        assert_ne!(frames[2].join_ref, frames[0].join_ref);
        assert!(session.is_subscribed(Table::Spots));
        assert!(!session.is_subscribed(Table::Categories));
    }

    #[tokio::test]
    async fn test_replaced_channel_ignores_close_of_previous_join() {
        let (transport, mut peer) = memory_pair();
        let mut session = RealtimeSession::new(transport, None);
        session.subscribe(Table::Spots).await.unwrap();
        session.subscribe(Table::Spots).await.unwrap();
        let frames = peer.sent();
        let old_ref = frames[0].join_ref.clone().unwrap();

        let topic = topic_for(Table::Spots);
        peer.push_text(&format!(
            r#"{{"topic":"{topic}","event":"phx_reply","ref":"2","join_ref":"{old_ref}","payload":{{"status":"ok","response":{{}}}}}}"#
        ))
        .unwrap();
        peer.push_text(&format!(
            r#"{{"topic":"{topic}","event":"phx_close","ref":null,"join_ref":"{old_ref}","payload":{{}}}}"#
        ))
        .unwrap();
        peer.hang_up();

        let store = SpotStore::new(MemoryBackend::signed_in(user()));
        let (_stop_tx, mut stop) = watch::channel(false);
        session
            .run(&store, std::future::pending::<()>, &mut stop)
            .await
            .unwrap();
        assert!(session.is_subscribed(Table::Spots));

        // The same close for the live join still ends the pump
        let (transport, mut peer) = memory_pair();
        let mut session = RealtimeSession::new(transport, None);
        session.subscribe(Table::Spots).await.unwrap();
        let live_ref = peer.sent()[0].join_ref.clone().unwrap();
        peer.push_text(&format!(
            r#"{{"topic":"{topic}","event":"phx_close","ref":null,"join_ref":"{live_ref}","payload":{{}}}}"#
        ))
        .unwrap();
        assert!(matches!(session.next_change().await, Err(DomainError::Realtime(_))));
    }

    #[tokio::test]
    async fn test_next_change_filters_topics() {
        let (mut session, peer) = subscribed().await;

        peer.push_text(r#"{"topic":"phoenix","event":"phx_reply","ref":"9","payload":{"status":"ok","response":{}}}"#)
            .unwrap();
        peer.push(&Frame::change("realtime:other", &insert_category(7, "Elsewhere")))
            .unwrap();
        peer.push_text("not json").unwrap();
        let wanted = insert_category(1, "Food");
        peer.push(&Frame::change(&topic_for(Table::Categories), &wanted)).unwrap();

        let change = session.next_change().await.unwrap().unwrap();
        assert_eq!(change, wanted);
    }

    #[tokio::test]
    async fn test_rejected_join_is_an_error() {
        let (mut session, peer) = subscribed().await;
        peer.push_text(
            r#"{"topic":"realtime:spots-changes","event":"phx_reply","ref":"2","payload":{"status":"error","response":{"reason":"unauthorized"}}}"#,
        )
        .unwrap();
        assert!(matches!(session.next_change().await, Err(DomainError::Realtime(_))));
    }

    #[tokio::test]
    async fn test_token_update_reaches_open_channels() {
        let (mut session, mut peer) = subscribed().await;
        session.set_access_token(Some("jwt-2".into())).await.unwrap();

        let frames = peer.sent();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.event == "access_token"));
        assert!(frames.iter().all(|f| f.payload == json!({ "access_token": "jwt-2" })));
    }

    #[tokio::test]
    async fn test_run_merges_until_socket_closes() {
        let (mut session, mut peer) = subscribed().await;
        let store = SpotStore::new(MemoryBackend::signed_in(user()));
        let (_stop_tx, mut stop) = watch::channel(false);

        let topic = topic_for(Table::Categories);
        peer.push(&Frame::change(&topic, &insert_category(1, "Food"))).unwrap();
        peer.push(&Frame::change(&topic, &insert_category(1, "Food"))).unwrap();
        peer.push(&Frame::change(&topic, &insert_category(2, "Parks"))).unwrap();
        peer.hang_up();

        session
            .run(&store, std::future::pending::<()>, &mut stop)
            .await
            .unwrap();

        let names: Vec<_> = store
            .snapshot()
            .categories()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, ["Food", "Parks"]);
    }

    #[tokio::test]
    async fn test_run_heartbeats_and_stops() {
        let (mut session, mut peer) = subscribed().await;
        let store = SpotStore::new(MemoryBackend::signed_in(user()));
        let (stop_tx, mut stop) = watch::channel(false);

        let pump = session.run(&store, || tokio::time::sleep(Duration::from_millis(5)), &mut stop);
        let watcher = async {
            let frame = peer.next_sent().await;
            stop_tx.send(true).unwrap();
            frame
        };
        let (result, frame) = tokio::join!(pump, watcher);

        result.unwrap();
        let frame = frame.unwrap();
        assert_eq!(frame.topic, "phoenix");
        assert_eq!(frame.event, "heartbeat");
    }

    #[tokio::test]
    async fn test_close_leaves_all_channels() {
        let (session, mut peer) = subscribed().await;
        session.close().await.unwrap();

        let frames = peer.sent();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.event == "phx_leave"));
    }
}
