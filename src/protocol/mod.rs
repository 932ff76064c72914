//! Live development protocol session.
//!
//! # Module Structure
//!
//! - `message` - request serialization and incoming classification
//! - `pending` - message IDs and queries waiting for responses
//! - `events` - typed emitter with drop-to-unsubscribe guards
//! - `session` - [`ProtocolSession`]: connections, verbs and dispatch
//!
//! # Flow
//!
//! ```text
//! caller --verb--> ProtocolSession --json--> Transport --> pages
//!                        ^                                   |
//!                        +---- TransportEvent (channel) -----+
//!                        |
//!                        +--> Emitter<SessionEvent> --> LiveDocument, ...
//! ```

mod events;
mod message;
mod pending;
mod session;

pub use events::{Emitter, Subscription, Subscriptions};
pub use message::{Incoming, MessageError, Request};
pub use pending::{PendingTable, ResponseFuture};
pub use session::{Connection, ConnectionState, ProtocolSession, SessionOptions};

use serde_json::Value;
use thiserror::Error;

use crate::transport::ClientId;

/// Why a query's future settled without a result.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// The response carried an `error` field; holds the whole response.
    #[error("remote error: {0}")]
    Remote(Value),

    /// Every client the query was sent to disconnected.
    #[error("all target clients disconnected")]
    Disconnected,

    /// The session went away before a response arrived.
    #[error("request abandoned before a response arrived")]
    Abandoned,

    /// The query had no clients to go to.
    #[error("no clients to send to")]
    NoClients,

    /// No transport has been set.
    #[error("no transport set")]
    NotStarted,
}

/// An unsolicited message from a page.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    pub client_id: ClientId,
    /// Event name (the message's `method`)
    pub method: String,
    /// The whole message, with `clientId` added
    pub message: Value,
}

impl RemoteEvent {
    /// String field of the message.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.message.get(key).and_then(Value::as_str)
    }
}

/// What session subscribers are told about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionConnect { client_id: ClientId, url: String },
    ConnectionClose { client_id: ClientId },
    Remote(RemoteEvent),
    TransportError { message: String },
}
