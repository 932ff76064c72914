//! Protocol session: connection registry, message correlation, verbs.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use super::message::{self, Incoming, Request};
use super::pending::{PendingTable, ResponseFuture};
use super::{Emitter, ProtocolError, RemoteEvent, SessionEvent, Subscription};
use crate::config::LiveSection;
use crate::embed::remote::{
    DOCUMENT_OBSERVER_JS, FUNCTIONS_JS, OBSERVER_CONFIG_JS, ObserverVars, PROTOCOL_JS,
    REGISTRY_JS, script_tag,
};
use crate::transport::{ClientId, TaggedEvent, Transport, TransportEvent, TransportSink};
use crate::{debug, log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// One page attached to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub client_id: ClientId,
    pub url: String,
    pub state: ConnectionState,
}

/// Session behavior knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Reject queries once every client they went to has closed.
    pub reject_pending_on_disconnect: bool,
    /// Stylesheet load poll period for the page's document observer.
    pub stylesheet_poll_interval_ms: u64,
    /// Polls before the page gives up on a stylesheet.
    pub stylesheet_poll_attempts: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&LiveSection::default())
    }
}

impl SessionOptions {
    pub fn from_config(live: &LiveSection) -> Self {
        Self {
            reject_pending_on_disconnect: live.reject_pending_on_disconnect,
            stylesheet_poll_interval_ms: live.stylesheet_poll_interval_ms,
            stylesheet_poll_attempts: live.stylesheet_poll_attempts,
        }
    }
}

#[derive(Default)]
struct SessionState {
    transport: Option<Arc<dyn Transport>>,
    /// Bumped on every `set_transport`; events tagged older are ignored
    generation: u64,
    connections: FxHashMap<ClientId, Connection>,
    pending: PendingTable,
}

struct SessionInner {
    state: Mutex<SessionState>,
    events: Emitter<SessionEvent>,
    tx: mpsc::UnboundedSender<TaggedEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<TaggedEvent>>>,
    shutdown: Notify,
    options: SessionOptions,
}

/// Handle to one live development session. Clones share the session.
#[derive(Clone)]
pub struct ProtocolSession {
    inner: Arc<SessionInner>,
}

impl Default for ProtocolSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl ProtocolSession {
    pub fn new(options: SessionOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::default()),
                events: Emitter::new(),
                tx,
                rx: Mutex::new(Some(rx)),
                shutdown: Notify::new(),
                options,
            }),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    // ========================================================================
    // Transport lifecycle
    // ========================================================================

    /// Make `transport` the active transport and start it.
    ///
    /// Events still queued from a previous transport are ignored from now
    /// on. Its connections are closed as if it had reported them closed.
    /// Queries sent through it stay pending unless
    /// `reject_pending_on_disconnect` is set.
    pub fn set_transport(
        &self,
        transport: Arc<dyn Transport>,
    ) -> Result<(), crate::transport::TransportError> {
        let (sink, dropped) = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            let dropped = match state.transport.replace(Arc::clone(&transport)) {
                Some(_) => sorted_ids(&state.connections),
                None => Vec::new(),
            };
            let sink = TransportSink::new(state.generation, self.inner.tx.clone());
            (sink, dropped)
        };
        for client_id in dropped {
            self.on_transport_close(client_id);
        }
        transport.start(sink)
    }

    /// Handle every queued transport event without waiting.
    ///
    /// Returns the number of events handled. Does nothing while `run` owns
    /// the queue.
    pub fn pump(&self) -> usize {
        let mut handled = 0;
        loop {
            let next = match self.inner.rx.lock().as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            let Some((generation, event)) = next else {
                return handled;
            };
            self.dispatch_tagged(generation, event);
            handled += 1;
        }
    }

    /// Handle transport events as they arrive until [`Self::shutdown`].
    pub async fn run(&self) {
        let Some(mut rx) = self.inner.rx.lock().take() else {
            log!("protocol"; "session is already running");
            return;
        };
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some((generation, event)) => self.dispatch_tagged(generation, event),
                    None => break,
                },
                () = self.inner.shutdown.notified() => break,
            }
        }
        *self.inner.rx.lock() = Some(rx);
        debug!("protocol"; "session loop stopped");
    }

    /// Stop `run` and the active transport.
    pub fn shutdown(&self) {
        let transport = self.inner.state.lock().transport.clone();
        if let Some(transport) = transport {
            transport.shutdown();
        }
        self.inner.shutdown.notify_one();
    }

    fn dispatch_tagged(&self, generation: u64, event: TransportEvent) {
        let current = self.inner.state.lock().generation;
        if generation != current {
            debug!("protocol"; "ignoring event from replaced transport: {:?}", event);
            return;
        }
        self.dispatch(event);
    }

    /// Handle one transport event.
    pub fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connect { client, url } => self.on_transport_connect(client, url),
            TransportEvent::Message { client, text } => self.on_transport_message(client, &text),
            TransportEvent::Close { client } => self.on_transport_close(client),
            TransportEvent::Error { message } => {
                log!("protocol"; "transport error: {}", message);
                self.inner.events.emit(&SessionEvent::TransportError { message });
            }
        }
    }

    pub fn on_transport_connect(&self, client_id: ClientId, url: String) {
        {
            let mut state = self.inner.state.lock();
            state.connections.insert(
                client_id,
                Connection {
                    client_id,
                    url: url.clone(),
                    state: ConnectionState::Connected,
                },
            );
        }
        debug!("protocol"; "client {} connected: {}", client_id, url);
        self.inner
            .events
            .emit(&SessionEvent::ConnectionConnect { client_id, url });
    }

    pub fn on_transport_close(&self, client_id: ClientId) {
        let rejected = {
            let mut state = self.inner.state.lock();
            if let Some(connection) = state.connections.remove(&client_id) {
                debug!("protocol"; "client {} closed: {}", client_id, connection.url);
            }
            if self.inner.options.reject_pending_on_disconnect {
                let SessionState {
                    connections,
                    pending,
                    ..
                } = &mut *state;
                pending.reject_orphaned(|c| connections.contains_key(&c))
            } else {
                Vec::new()
            }
        };
        if !rejected.is_empty() {
            debug!("protocol"; "rejected {} orphaned requests", rejected.len());
        }
        self.inner
            .events
            .emit(&SessionEvent::ConnectionClose { client_id });
    }

    pub fn on_transport_message(&self, client_id: ClientId, text: &str) {
        let incoming = match message::parse(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                let message = format!("client {client_id}: {e}");
                log!("protocol"; "dropped message from {}", message);
                self.inner.events.emit(&SessionEvent::TransportError { message });
                return;
            }
        };

        match incoming {
            Incoming::Response {
                id,
                message,
                is_error,
            } => {
                let result = if is_error {
                    Err(ProtocolError::Remote(message))
                } else {
                    Ok(message)
                };
                if !self.inner.state.lock().pending.settle(id, result) {
                    debug!("protocol"; "no pending request #{} (client {})", id, client_id);
                }
            }
            Incoming::Event {
                method,
                mut message,
            } => {
                if let Some(fields) = message.as_object_mut() {
                    fields.insert("clientId".into(), json!(client_id.0));
                }
                self.inner.events.emit(&SessionEvent::Remote(RemoteEvent {
                    client_id,
                    method,
                    message,
                }));
            }
        }
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send a correlated query to `clients`, or to every connection.
    ///
    /// When several clients answer, only the first response is observed.
    pub fn send(&self, method: &str, params: Value, clients: Option<&[ClientId]>) -> ResponseFuture {
        let (transport, targets, id, future) = {
            let mut state = self.inner.state.lock();
            let Some(transport) = state.transport.clone() else {
                return ResponseFuture::failed(ProtocolError::NotStarted);
            };
            let targets = match clients {
                Some(clients) => clients.to_vec(),
                None => sorted_ids(&state.connections),
            };
            if targets.is_empty() {
                // nobody can answer; keep the ID sequence but track nothing
                let id = state.pending.allocate_id();
                (transport, targets, id, ResponseFuture::failed(ProtocolError::NoClients))
            } else {
                let (id, future) = state.pending.register(targets.clone());
                (transport, targets, id, future)
            }
        };

        let request = Request::Query {
            id,
            method: method.to_string(),
            params,
        };
        if targets.is_empty() {
            debug!("protocol"; "#{} {} has no clients to go to", id, method);
        }
        transport.send(&targets, &request.to_json());
        debug!("protocol"; "sent #{} {} to {} clients", id, method, targets.len());
        future
    }

    /// Send a fire-and-forget command.
    pub fn notify(
        &self,
        method: &str,
        params: Value,
        clients: Option<&[ClientId]>,
    ) -> Result<(), ProtocolError> {
        let (transport, targets) = {
            let state = self.inner.state.lock();
            let transport = state.transport.clone().ok_or(ProtocolError::NotStarted)?;
            let targets = match clients {
                Some(clients) => clients.to_vec(),
                None => sorted_ids(&state.connections),
            };
            (transport, targets)
        };
        let request = Request::Command {
            method: method.to_string(),
            params,
        };
        transport.send(&targets, &request.to_json());
        Ok(())
    }

    /// `Runtime.evaluate`
    pub fn evaluate(&self, script: &str, clients: Option<&[ClientId]>) -> ResponseFuture {
        self.send("Runtime.evaluate", json!({ "expression": script }), clients)
    }

    /// `Page.reload`
    pub fn reload(&self, ignore_cache: bool, clients: Option<&[ClientId]>) -> ResponseFuture {
        self.send("Page.reload", json!({ "ignoreCache": ignore_cache }), clients)
    }

    /// `Page.navigate`
    pub fn navigate(&self, url: &str, clients: Option<&[ClientId]>) -> ResponseFuture {
        self.send("Page.navigate", json!({ "url": url }), clients)
    }

    /// `CSS.getStylesheetText`
    pub fn get_stylesheet_text(&self, url: &str, clients: Option<&[ClientId]>) -> ResponseFuture {
        self.send("CSS.getStylesheetText", json!({ "url": url }), clients)
    }

    /// `CSS.setStylesheetText`
    pub fn set_stylesheet_text(
        &self,
        url: &str,
        text: &str,
        clients: Option<&[ClientId]>,
    ) -> ResponseFuture {
        self.send(
            "CSS.setStylesheetText",
            json!({ "url": url, "text": text }),
            clients,
        )
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Ask the transport to close one client. The registry entry goes away
    /// when the transport reports the close.
    pub fn close(&self, client_id: ClientId) {
        let transport = self.inner.state.lock().transport.clone();
        if let Some(transport) = transport {
            transport.close(client_id);
        }
    }

    /// Close every client and clear the registry right away.
    pub fn close_all_connections(&self) {
        let (transport, ids) = {
            let mut state = self.inner.state.lock();
            let ids = sorted_ids(&state.connections);
            state.connections.clear();
            (state.transport.clone(), ids)
        };
        if let Some(transport) = transport {
            for id in ids {
                transport.close(id);
            }
        }
    }

    /// Connected client IDs, ascending.
    pub fn connection_ids(&self) -> Vec<ClientId> {
        sorted_ids(&self.inner.state.lock().connections)
    }

    pub fn connection(&self, client_id: ClientId) -> Option<Connection> {
        self.inner.state.lock().connections.get(&client_id).cloned()
    }

    /// Number of queries still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    // ========================================================================
    // Events and page scripts
    // ========================================================================

    pub fn events(&self) -> &Emitter<SessionEvent> {
        &self.inner.events
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, handler: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.events.subscribe(handler)
    }

    /// `<script>` elements to inject into a live HTML page.
    pub fn get_remote_script(&self) -> String {
        let transport = self.inner.state.lock().transport.clone();
        let mut script = transport.map(|t| t.remote_script()).unwrap_or_default();

        let config = OBSERVER_CONFIG_JS.render(&ObserverVars {
            poll_interval_ms: self.inner.options.stylesheet_poll_interval_ms,
            poll_attempts: self.inner.options.stylesheet_poll_attempts,
        });
        script.push_str(&script_tag(&format!("{config}\n{PROTOCOL_JS}")));
        script.push_str(&script_tag(DOCUMENT_OBSERVER_JS));
        script.push_str(&script_tag(REGISTRY_JS));
        script.push_str(&script_tag(FUNCTIONS_JS));
        script
    }
}

fn sorted_ids(connections: &FxHashMap<ClientId, Connection>) -> Vec<ClientId> {
    let mut ids: Vec<ClientId> = connections.keys().copied().collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn session_with(options: SessionOptions) -> (ProtocolSession, Arc<MemoryTransport>) {
        let session = ProtocolSession::new(options);
        let transport = Arc::new(MemoryTransport::new());
        session.set_transport(transport.clone()).unwrap();
        (session, transport)
    }

    fn session() -> (ProtocolSession, Arc<MemoryTransport>) {
        session_with(SessionOptions::default())
    }

    fn record(session: &ProtocolSession) -> (Arc<Mutex<Vec<SessionEvent>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = session.subscribe(move |event| sink.lock().push(event.clone()));
        (seen, sub)
    }

    fn connect(session: &ProtocolSession, transport: &MemoryTransport, id: u64) -> ClientId {
        let client = ClientId(id);
        transport.connect(client, "http://localhost/index.html");
        session.pump();
        client
    }

    #[test]
    fn test_connection_lifecycle_events() {
        let (session, transport) = session();
        let (seen, _sub) = record(&session);

        transport.connect(ClientId(7), "http://localhost/a.html");
        session.pump();
        assert_eq!(session.connection_ids(), vec![ClientId(7)]);

        transport.disconnect(ClientId(7));
        session.pump();
        assert!(session.connection_ids().is_empty());

        assert_eq!(
            *seen.lock(),
            vec![
                SessionEvent::ConnectionConnect {
                    client_id: ClientId(7),
                    url: "http://localhost/a.html".into()
                },
                SessionEvent::ConnectionClose {
                    client_id: ClientId(7)
                },
            ]
        );
    }

    #[test]
    fn test_message_ids_increase_from_one() {
        let (session, transport) = session();
        let client = connect(&session, &transport, 1);

        let first = session.evaluate("1", None);
        let second = session.navigate("http://localhost/b.html", Some(&[client]));
        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));

        let sent = transport.take_sent();
        assert_eq!(sent[0].json()["id"], 1);
        assert_eq!(sent[1].json()["method"], "Page.navigate");
        assert_eq!(sent[1].json()["params"]["url"], "http://localhost/b.html");
        assert_eq!(sent[0].clients, vec![client]);
    }

    #[tokio::test]
    async fn test_responses_match_their_own_request() {
        let (session, transport) = session();
        let client = connect(&session, &transport, 1);

        let futures: Vec<_> = (0..5).map(|i| session.evaluate(&i.to_string(), None)).collect();
        for id in [3, 1, 5, 2, 4] {
            let reply = format!(r#"{{"id":{id},"result":{{"value":{}}}}}"#, id * 100);
            transport.receive(client, &reply);
        }
        session.pump();

        for (i, future) in futures.into_iter().enumerate() {
            let id = i as u64 + 1;
            let response = future.await.unwrap();
            assert_eq!(response["id"], id);
            assert_eq!(response["result"]["value"], id * 100);
        }
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_first_response_wins() {
        let (session, transport) = session();
        let a = connect(&session, &transport, 1);
        let b = connect(&session, &transport, 2);

        let future = session.get_stylesheet_text("http://localhost/a.css", None);
        assert_eq!(transport.last_sent().unwrap().clients, vec![a, b]);

        transport.receive(b, r#"{"id":1,"result":{"text":"from b"}}"#);
        transport.receive(a, r#"{"id":1,"result":{"text":"from a"}}"#);
        session.pump();

        let response = future.await.unwrap();
        assert_eq!(response["result"]["text"], "from b");
    }

    #[tokio::test]
    async fn test_error_response_rejects() {
        let (session, transport) = session();
        let client = connect(&session, &transport, 1);

        let future = session.evaluate("throw 1", None);
        transport.receive(client, r#"{"id":1,"error":{"message":"boom"}}"#);
        session.pump();

        match future.await {
            Err(ProtocolError::Remote(message)) => assert_eq!(message["error"]["message"], "boom"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_events_are_annotated_with_client() {
        let (session, transport) = session();
        let client = connect(&session, &transport, 4);
        let (seen, _sub) = record(&session);

        transport.receive(client, r#"{"method":"ScriptAdded","src":"http://localhost/a.js"}"#);
        session.pump();

        let seen = seen.lock();
        let SessionEvent::Remote(event) = &seen[0] else {
            panic!("expected remote event");
        };
        assert_eq!(event.method, "ScriptAdded");
        assert_eq!(event.client_id, client);
        assert_eq!(event.message["clientId"], 4);
        assert_eq!(event.str_field("src"), Some("http://localhost/a.js"));
    }

    #[test]
    fn test_malformed_message_reports_and_continues() {
        let (session, transport) = session();
        let client = connect(&session, &transport, 1);
        let (seen, _sub) = record(&session);

        let mut future = session.evaluate("1", None);
        transport.receive(client, "{not json");
        transport.receive(client, r#"{"id":1,"result":{}}"#);
        session.pump();

        assert!(matches!(seen.lock()[0], SessionEvent::TransportError { .. }));
        assert!(matches!(future.try_result(), Some(Ok(_))));
    }

    #[test]
    fn test_transport_error_is_emitted() {
        let (session, transport) = session();
        let (seen, _sub) = record(&session);
        transport.fail("socket reset");
        session.pump();
        assert_eq!(
            *seen.lock(),
            vec![SessionEvent::TransportError {
                message: "socket reset".into()
            }]
        );
    }

    #[test]
    fn test_pending_survives_disconnect_by_default() {
        let (session, transport) = session();
        let client = connect(&session, &transport, 1);

        let mut future = session.evaluate("1", None);
        transport.disconnect(client);
        session.pump();

        assert_eq!(future.try_result(), None);
        assert_eq!(session.pending_count(), 1);
    }

    #[test]
    fn test_reject_pending_on_disconnect_opt_in() {
        let (session, transport) = session_with(SessionOptions {
            reject_pending_on_disconnect: true,
            ..SessionOptions::default()
        });
        let a = connect(&session, &transport, 1);
        let b = connect(&session, &transport, 2);

        let mut to_a = session.evaluate("1", Some(&[a]));
        let mut to_both = session.evaluate("2", None);
        transport.disconnect(a);
        session.pump();

        assert_eq!(to_a.try_result(), Some(Err(ProtocolError::Disconnected)));
        assert_eq!(to_both.try_result(), None);

        transport.disconnect(b);
        session.pump();
        assert_eq!(to_both.try_result(), Some(Err(ProtocolError::Disconnected)));
    }

    #[test]
    fn test_replaced_transport_is_ignored() {
        let (session, old) = session();
        let queued = old.connect(ClientId(1), "http://localhost/old.html");
        assert!(queued);

        let new = Arc::new(MemoryTransport::new());
        session.set_transport(new.clone()).unwrap();
        new.connect(ClientId(2), "http://localhost/new.html");
        session.pump();

        assert_eq!(session.connection_ids(), vec![ClientId(2)]);
        assert_eq!(new.start_count(), 1);
    }

    #[test]
    fn test_replacing_transport_closes_its_connections() {
        let (session, old) = session();
        let client = connect(&session, &old, 1);
        let _pending = session.evaluate("1", None);
        let (seen, _sub) = record(&session);

        session.set_transport(Arc::new(MemoryTransport::new())).unwrap();
        assert!(session.connection_ids().is_empty());
        assert_eq!(
            *seen.lock(),
            vec![SessionEvent::ConnectionClose { client_id: client }]
        );

        old.disconnect(client);
        session.pump();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_query_without_clients_is_not_tracked() {
        let (session, transport) = session();
        for _ in 0..50 {
            let mut future = session.evaluate("_LD.redrawHighlights()", None);
            assert_eq!(future.try_result(), Some(Err(ProtocolError::NoClients)));
        }
        assert_eq!(session.pending_count(), 0);

        let client = connect(&session, &transport, 1);
        let future = session.evaluate("1", None);
        assert_eq!(future.id(), Some(51));
        assert_eq!(transport.last_sent().unwrap().clients, vec![client]);
        assert_eq!(session.pending_count(), 1);
    }

    #[test]
    fn test_close_all_clears_registry_synchronously() {
        let (session, transport) = session();
        connect(&session, &transport, 1);
        connect(&session, &transport, 2);

        session.close_all_connections();
        assert!(session.connection_ids().is_empty());
        assert_eq!(transport.closed(), vec![ClientId(1), ClientId(2)]);
    }

    #[test]
    fn test_close_waits_for_transport() {
        let (session, transport) = session();
        let client = connect(&session, &transport, 1);

        session.close(client);
        assert_eq!(transport.closed(), vec![client]);
        assert_eq!(session.connection_ids(), vec![client]);
        session.pump();
        assert!(session.connection_ids().is_empty());
    }

    #[test]
    fn test_verbs_send_their_parameters() {
        let (session, transport) = session();
        let a = connect(&session, &transport, 1);
        connect(&session, &transport, 2);

        let _ = session.reload(false, None);
        let _ = session.set_stylesheet_text("http://localhost/a.css", "a{}", Some(&[a]));
        let sent = transport.take_sent();

        assert_eq!(sent[0].json()["params"]["ignoreCache"], false);
        assert_eq!(sent[1].clients, vec![a]);
        assert_eq!(sent[1].json()["params"]["text"], "a{}");
    }

    #[test]
    fn test_notify_has_no_id() {
        let (session, transport) = session();
        connect(&session, &transport, 1);
        session.notify("Page.reload", json!({}), None).unwrap();

        assert!(transport.last_sent().unwrap().json().get("id").is_none());
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_send_without_transport() {
        let session = ProtocolSession::default();
        let mut future = session.evaluate("1", None);
        assert_eq!(future.try_result(), Some(Err(ProtocolError::NotStarted)));
        assert_eq!(
            session.notify("Page.reload", json!({}), None),
            Err(ProtocolError::NotStarted)
        );
    }

    #[test]
    fn test_remote_script_parts() {
        let (session, _transport) = session();
        let script = session.get_remote_script();
        assert_eq!(script.matches("<script>").count(), 4);
        assert!(script.contains("pollAttempts: 100"));
    }

    #[tokio::test]
    async fn test_run_loop_dispatches() {
        let (session, transport) = session();
        let runner = session.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        transport.connect(ClientId(1), "http://localhost/index.html");
        let future = session.evaluate("1", Some(&[ClientId(1)]));
        transport.receive(ClientId(1), r#"{"id":1,"result":{"value":1}}"#);

        let response = future.await.unwrap();
        assert_eq!(response["result"]["value"], 1);
        assert_eq!(session.connection_ids(), vec![ClientId(1)]);

        session.shutdown();
        handle.await.unwrap();
    }
}
