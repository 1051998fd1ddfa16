//! Browser WebSocket Transport
//!
//! [`Transport`] over `web_sys::WebSocket`. The socket's callbacks feed an
//! unbounded channel that `recv` drains.

use async_trait::async_trait;
use log::debug;
use tokio::sync::mpsc;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use spotbook_core::{DomainError, DomainResult, Transport};

enum SocketEvent {
    Opened,
    Text(String),
    Failed,
    Closed,
}

pub struct BrowserSocket {
    socket: WebSocket,
    events: mpsc::UnboundedReceiver<SocketEvent>,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

fn js_error(e: JsValue) -> DomainError {
    DomainError::Realtime(format!("{e:?}"))
}

impl BrowserSocket {
    /// Opens the socket and waits until it is connected
    pub async fn connect(url: &str) -> DomainResult<Self> {
        let socket = WebSocket::new(url).map_err(js_error)?;
        let (tx, events) = mpsc::unbounded_channel();

        let open_tx = tx.clone();
        let on_open = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            let _ = open_tx.send(SocketEvent::Opened);
        });
        let message_tx = tx.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |ev: MessageEvent| {
            if let Some(text) = ev.data().as_string() {
                let _ = message_tx.send(SocketEvent::Text(text));
            }
        });
        let error_tx = tx.clone();
        let on_error = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            let _ = error_tx.send(SocketEvent::Failed);
        });
        let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |ev: CloseEvent| {
            debug!("socket closed: {} {}", ev.code(), ev.reason());
            let _ = tx.send(SocketEvent::Closed);
        });

        socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        let mut this = Self {
            socket,
            events,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        };
        match this.events.recv().await {
            Some(SocketEvent::Opened) => Ok(this),
            _ => Err(DomainError::Realtime(format!("could not connect to {url}"))),
        }
    }
}

#[async_trait(?Send)]
impl Transport for BrowserSocket {
    async fn send(&mut self, text: String) -> DomainResult<()> {
        self.socket.send_with_str(&text).map_err(js_error)
    }

    async fn recv(&mut self) -> Option<DomainResult<String>> {
        loop {
            match self.events.recv().await? {
                SocketEvent::Text(text) => return Some(Ok(text)),
                SocketEvent::Failed => {
                    return Some(Err(DomainError::Realtime("socket error".to_string())))
                }
                SocketEvent::Closed => return None,
                SocketEvent::Opened => continue,
            }
        }
    }

    async fn close(&mut self) -> DomainResult<()> {
        self.socket.close().map_err(js_error)
    }
}

impl Drop for BrowserSocket {
    fn drop(&mut self) {
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
        let _ = self.socket.close();
    }
}
