//! In-process transport.
//!
//! Messages the session sends are recorded instead of written to a socket,
//! and the page side is simulated with [`MemoryTransport::connect`],
//! [`MemoryTransport::receive`] and [`MemoryTransport::disconnect`].

use parking_lot::Mutex;

use super::{ClientId, Transport, TransportError, TransportSink};

/// A message handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub clients: Vec<ClientId>,
    pub message: String,
}

impl Sent {
    /// Parse the message text as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.message).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Default)]
pub struct MemoryTransport {
    sink: Mutex<Option<TransportSink>>,
    sent: Mutex<Vec<Sent>>,
    closed: Mutex<Vec<ClientId>>,
    starts: Mutex<usize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sink(&self, f: impl FnOnce(&TransportSink) -> bool) -> bool {
        self.sink.lock().as_ref().is_some_and(f)
    }

    /// Simulate a page connecting.
    pub fn connect(&self, client: ClientId, url: &str) -> bool {
        self.with_sink(|sink| sink.connect(client, url))
    }

    /// Simulate a page sending protocol text.
    pub fn receive(&self, client: ClientId, text: &str) -> bool {
        self.with_sink(|sink| sink.message(client, text))
    }

    /// Simulate a page going away.
    pub fn disconnect(&self, client: ClientId) -> bool {
        self.with_sink(|sink| sink.close(client))
    }

    /// Simulate a socket failure.
    pub fn fail(&self, message: &str) -> bool {
        self.with_sink(|sink| sink.error(message))
    }

    /// Everything sent so far, oldest first, clearing the record.
    pub fn take_sent(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Most recent message sent, without clearing.
    pub fn last_sent(&self) -> Option<Sent> {
        self.sent.lock().last().cloned()
    }

    /// Clients passed to `close`, in call order.
    pub fn closed(&self) -> Vec<ClientId> {
        self.closed.lock().clone()
    }

    /// How many times the transport was started.
    pub fn start_count(&self) -> usize {
        *self.starts.lock()
    }
}

impl Transport for MemoryTransport {
    fn start(&self, sink: TransportSink) -> Result<(), TransportError> {
        *self.sink.lock() = Some(sink);
        *self.starts.lock() += 1;
        Ok(())
    }

    fn send(&self, clients: &[ClientId], message: &str) {
        self.sent.lock().push(Sent {
            clients: clients.to_vec(),
            message: message.to_string(),
        });
    }

    fn close(&self, client: ClientId) {
        self.closed.lock().push(client);
        self.with_sink(|sink| sink.close(client));
    }

    fn remote_script(&self) -> String {
        String::new()
    }

    fn shutdown(&self) {
        self.sink.lock().take();
    }
}
