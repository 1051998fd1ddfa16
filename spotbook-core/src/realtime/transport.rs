//! Realtime Transport
//!
//! The text-frame socket a [`RealtimeSession`](super::RealtimeSession) runs over.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{DomainError, DomainResult};
use super::protocol::Frame;

/// A bidirectional text socket
///
/// `recv` must be cancel-safe: the session races it against heartbeats.
#[async_trait(?Send)]
pub trait Transport {
    async fn send(&mut self, text: String) -> DomainResult<()>;

    /// Next text frame; `None` once the socket is closed
    async fn recv(&mut self) -> Option<DomainResult<String>>;

    async fn close(&mut self) -> DomainResult<()>;
}

/// Client half of an in-process socket
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

/// Server half of an in-process socket
pub struct MemoryPeer {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

pub fn memory_pair() -> (MemoryTransport, MemoryPeer) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            inbound,
            outbound: Some(outbound),
        },
        MemoryPeer {
            to_client: Some(to_client),
            from_client,
        },
    )
}

#[async_trait(?Send)]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> DomainResult<()> {
        self.outbound
            .as_ref()
            .and_then(|tx| tx.send(text).ok())
            .ok_or_else(|| DomainError::Realtime("socket closed".to_string()))
    }

    async fn recv(&mut self) -> Option<DomainResult<String>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> DomainResult<()> {
        self.outbound = None;
        self.inbound.close();
        Ok(())
    }
}

impl MemoryPeer {
    /// Delivers a frame to the client
    pub fn push(&self, frame: &Frame) -> DomainResult<()> {
        self.push_text(frame.encode()?)
    }

    pub fn push_text(&self, text: impl Into<String>) -> DomainResult<()> {
        self.to_client
            .as_ref()
            .and_then(|tx| tx.send(text.into()).ok())
            .ok_or_else(|| DomainError::Realtime("socket closed".to_string()))
    }

    /// Frames the client has sent so far
    pub fn sent(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            if let Ok(frame) = Frame::decode(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Waits for the next frame the client sends
    pub async fn next_sent(&mut self) -> Option<Frame> {
        let text = self.from_client.recv().await?;
        Frame::decode(&text).ok()
    }

    /// Closes the server side; the client's `recv` then yields `None`
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }
}
