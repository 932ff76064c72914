//! Duplex message channel between the session and live pages.
//!
//! A transport accepts page connections, assigns each a [`ClientId`], and
//! reports what happens on them as [`TransportEvent`]s pushed into the
//! [`TransportSink`] it was started with. The session never touches sockets.
//!
//! - `ws` - WebSocket transport used by `livedev serve`
//! - `memory` - in-process transport for embedding and tests

mod memory;
mod ws;

pub use memory::MemoryTransport;
pub use ws::WsTransport;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifier the transport assigns to one connected page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A page finished its handshake and reported its URL.
    Connect { client: ClientId, url: String },
    /// Raw protocol text received from a page.
    Message { client: ClientId, text: String },
    /// A page went away.
    Close { client: ClientId },
    /// Socket-level failure; the transport keeps running.
    Error { message: String },
}

/// Transport events tagged with the generation of the transport that raised them.
pub(crate) type TaggedEvent = (u64, TransportEvent);

/// Where a started transport delivers its events.
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl TransportSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    /// Deliver one event. Returns false once the session is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn connect(&self, client: ClientId, url: impl Into<String>) -> bool {
        self.emit(TransportEvent::Connect {
            client,
            url: url.into(),
        })
    }

    pub fn message(&self, client: ClientId, text: impl Into<String>) -> bool {
        self.emit(TransportEvent::Message {
            client,
            text: text.into(),
        })
    }

    pub fn close(&self, client: ClientId) -> bool {
        self.emit(TransportEvent::Close { client })
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error {
            message: message.into(),
        })
    }
}

/// Transport startup failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr} after {attempts} attempts: {source}")]
    Bind {
        addr: String,
        attempts: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("transport already started")]
    AlreadyStarted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A duplex channel to live pages.
///
/// `send` and `close` must not block on the network for long; failures on
/// individual clients are reported through the sink instead of returned.
pub trait Transport: Send + Sync {
    /// Begin accepting pages, delivering events to `sink`.
    fn start(&self, sink: TransportSink) -> Result<(), TransportError>;

    /// Send one protocol message to each listed client.
    fn send(&self, clients: &[ClientId], message: &str);

    /// Close one client connection.
    fn close(&self, client: ClientId);

    /// HTML (`<script>` elements) that connects a page to this transport.
    fn remote_script(&self) -> String;

    /// Stop accepting pages and drop every connection.
    fn shutdown(&self) {}
}
