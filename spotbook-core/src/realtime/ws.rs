//! Native WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::error::{DomainError, DomainResult};
use super::transport::Transport;

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> DomainResult<Self> {
        let (stream, response) = connect_async(url).await.map_err(socket_error)?;
        debug!("realtime: socket open ({})", response.status());
        Ok(Self { stream })
    }
}

fn socket_error(e: tokio_tungstenite::tungstenite::Error) -> DomainError {
    DomainError::Realtime(e.to_string())
}

#[async_trait(?Send)]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> DomainResult<()> {
        self.stream.send(Message::Text(text)).await.map_err(socket_error)
    }

    async fn recv(&mut self) -> Option<DomainResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Some(Err(socket_error(e))),
            }
        }
    }

    async fn close(&mut self) -> DomainResult<()> {
        self.stream.close(None).await.map_err(socket_error)
    }
}
