//! WebSocket transport.
//!
//! One acceptor thread performs handshakes; one reader thread polls every
//! client socket in non-blocking mode. Pages announce themselves with a
//! `connect` frame before any protocol traffic:
//!
//! ```text
//! page -> {"type":"connect","url":"http://127.0.0.1:5277/index.html"}
//! page -> {"type":"message","message":"{\"id\":1,\"result\":{}}"}
//! server -> {"method":"Runtime.evaluate","id":2,"params":{...}}
//! ```

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::{ClientId, Transport, TransportError, TransportSink};
use crate::embed::remote::{TRANSPORT_CONFIG_JS, TRANSPORT_JS, TransportVars, script_tag};
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Sleep between accept and read polls
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Frame sent by the page's transport script.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Frame {
    Connect { url: String },
    Message { message: String },
}

/// A handshaken page socket
struct RegisteredClient {
    id: ClientId,
    ws: WebSocket<TcpStream>,
    /// Set once the page sent its `connect` frame
    url: Option<String>,
}

type Clients = Arc<Mutex<Vec<RegisteredClient>>>;

/// WebSocket transport bound to a local port.
pub struct WsTransport {
    listener: Mutex<Option<TcpListener>>,
    addr: SocketAddr,
    clients: Clients,
    sink: Arc<Mutex<Option<TransportSink>>>,
    next_id: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
}

impl WsTransport {
    /// Bind to `interface`, trying `base_port` and the next few ports.
    pub fn bind(interface: &str, base_port: u16) -> Result<Self, TransportError> {
        let listener = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            addr,
            clients: Arc::new(Mutex::new(Vec::new())),
            sink: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Bound address (the port may differ from the requested one).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL pages connect to.
    pub fn url(&self) -> String {
        let host = if self.addr.ip().is_unspecified() {
            "127.0.0.1".to_string()
        } else {
            self.addr.ip().to_string()
        };
        format!("ws://{}:{}", host, self.addr.port())
    }

    /// Number of handshaken sockets, announced or not.
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    fn acceptor_loop(
        listener: TcpListener,
        clients: Clients,
        next_id: Arc<AtomicU64>,
        stopped: Arc<AtomicBool>,
    ) {
        while !stopped.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    debug!("ws"; "tcp connection from {}", addr);
                    // Blocking during the handshake, non-blocking for polling reads after
                    let _ = stream.set_nonblocking(false);
                    match tungstenite::accept(stream) {
                        Ok(ws) => {
                            let _ = ws.get_ref().set_nonblocking(true);
                            let id = ClientId(next_id.fetch_add(1, Ordering::Relaxed));
                            let mut clients = clients.lock();
                            clients.push(RegisteredClient { id, ws, url: None });
                            debug!("ws"; "client {} accepted (total: {})", id, clients.len());
                        }
                        Err(e) => {
                            log!("ws"; "handshake failed: {}", e);
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    log!("ws"; "accept error: {}", e);
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    fn client_reader_loop(
        clients: Clients,
        sink: Arc<Mutex<Option<TransportSink>>>,
        stopped: Arc<AtomicBool>,
    ) {
        while !stopped.load(Ordering::Relaxed) {
            std::thread::sleep(POLL_INTERVAL);

            let Some(sink) = sink.lock().clone() else {
                continue;
            };
            let mut clients = clients.lock();
            let mut disconnected = Vec::new();

            for (i, client) in clients.iter_mut().enumerate() {
                if !Self::drain_client(client, &sink) {
                    disconnected.push(i);
                }
            }

            for i in disconnected.into_iter().rev() {
                let client = clients.remove(i);
                debug!("ws"; "client {} disconnected", client.id);
                if client.url.is_some() {
                    sink.close(client.id);
                }
            }
        }
    }

    /// Read every frame available on one socket. Returns false when it closed.
    fn drain_client(client: &mut RegisteredClient, sink: &TransportSink) -> bool {
        // flush anything a non-blocking send left buffered
        match client.ws.flush() {
            Ok(()) => {}
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => return false,
        }

        loop {
            match client.ws.read() {
                Ok(Message::Text(text)) => match parse_frame(&text) {
                    Some(Frame::Connect { url }) => {
                        debug!("ws"; "client {} is {}", client.id, url);
                        client.url = Some(url.clone());
                        sink.connect(client.id, url);
                    }
                    Some(Frame::Message { message }) => {
                        if client.url.is_none() {
                            debug!("ws"; "client {} sent before connect, dropped", client.id);
                            continue;
                        }
                        sink.message(client.id, message);
                    }
                    None => {
                        debug!("ws"; "unrecognized frame from client {}", client.id);
                    }
                },
                Ok(Message::Close(_)) => return false,
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return true;
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return false;
                }
                Err(e) => {
                    sink.error(format!("client {}: {}", client.id, e));
                    return false;
                }
            }
        }
    }
}

impl Transport for WsTransport {
    fn start(&self, sink: TransportSink) -> Result<(), TransportError> {
        let Some(listener) = self.listener.lock().take() else {
            // Restarted with a new session: keep the threads, swap the sink
            *self.sink.lock() = Some(sink);
            return Ok(());
        };
        listener.set_nonblocking(true)?;
        *self.sink.lock() = Some(sink);

        let clients = Arc::clone(&self.clients);
        let next_id = Arc::clone(&self.next_id);
        let stopped = Arc::clone(&self.stopped);
        std::thread::spawn(move || Self::acceptor_loop(listener, clients, next_id, stopped));

        let clients = Arc::clone(&self.clients);
        let sink = Arc::clone(&self.sink);
        let stopped = Arc::clone(&self.stopped);
        std::thread::spawn(move || Self::client_reader_loop(clients, sink, stopped));

        log!("ws"; "listening on {}", self.url());
        Ok(())
    }

    fn send(&self, targets: &[ClientId], message: &str) {
        let mut clients = self.clients.lock();
        let mut sent = 0;

        clients.retain_mut(|client| {
            if client.url.is_none() || !targets.contains(&client.id) {
                return true;
            }
            match client.ws.send(Message::Text(message.into())) {
                Ok(()) => {
                    sent += 1;
                    true
                }
                Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    // queued; flushed by the reader loop
                    sent += 1;
                    true
                }
                Err(e) => {
                    debug!("ws"; "client {} dropped on send: {}", client.id, e);
                    if let Some(sink) = self.sink.lock().as_ref() {
                        sink.close(client.id);
                    }
                    false
                }
            }
        });
        debug!("ws"; "sent to {}/{} clients", sent, targets.len());
    }

    fn close(&self, target: ClientId) {
        let mut clients = self.clients.lock();
        let Some(i) = clients.iter().position(|c| c.id == target) else {
            return;
        };
        let mut client = clients.remove(i);
        let _ = client.ws.close(None);
        let _ = client.ws.flush();
        if client.url.is_some()
            && let Some(sink) = self.sink.lock().as_ref()
        {
            sink.close(client.id);
        }
    }

    fn remote_script(&self) -> String {
        let url = self.url();
        let mut script = script_tag(&TRANSPORT_CONFIG_JS.render(&TransportVars { url: &url }));
        script.push_str(&script_tag(TRANSPORT_JS));
        script
    }

    fn shutdown(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        let mut clients = self.clients.lock();
        for mut client in clients.drain(..) {
            let _ = client.ws.close(None);
            let _ = client.ws.flush();
        }
        debug!("ws"; "shut down");
    }
}

fn parse_frame(text: &str) -> Option<Frame> {
    serde_json::from_str(text).ok()
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: &str, base_port: u16, max_retries: u16) -> Result<TcpListener, TransportError> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)) {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                last_error = Some(e);
            }
        }
    }

    Err(TransportError::Bind {
        addr: format!("{interface}:{base_port}"),
        attempts: max_retries,
        source: last_error.unwrap_or_else(|| std::io::Error::other("no ports tried")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportEvent;
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_connect_frame() {
        let frame = parse_frame(r#"{"type":"connect","url":"http://localhost/a.html"}"#);
        assert_eq!(
            frame,
            Some(Frame::Connect {
                url: "http://localhost/a.html".into()
            })
        );
    }

    #[test]
    fn test_parse_message_frame() {
        let frame = parse_frame(r#"{"type":"message","message":"{\"id\":1}"}"#);
        assert_eq!(
            frame,
            Some(Frame::Message {
                message: r#"{"id":1}"#.into()
            })
        );
    }

    #[test]
    fn test_parse_unknown_frame() {
        assert_eq!(parse_frame(r#"{"type":"page","path":"/"}"#), None);
        assert_eq!(parse_frame("not json"), None);
    }

    #[test]
    fn test_bind_retries_busy_port() {
        let first = WsTransport::bind("127.0.0.1", 0).unwrap();
        let busy = first.local_addr().port();
        let second = WsTransport::bind("127.0.0.1", busy).unwrap();
        assert_ne!(second.local_addr().port(), busy);
    }

    #[test]
    fn test_remote_script_points_at_bound_port() {
        let transport = WsTransport::bind("127.0.0.1", 0).unwrap();
        let script = transport.remote_script();
        let port = transport.local_addr().port().to_string();
        assert!(script.contains(&format!("ws://127.0.0.1:{port}")));
        assert_eq!(script.matches("<script>").count(), 2);
    }

    #[test]
    fn test_client_roundtrip() {
        let transport = WsTransport::bind("127.0.0.1", 0).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.start(TransportSink::new(0, tx)).unwrap();

        let (mut socket, _) = tungstenite::connect(transport.url()).unwrap();
        socket
            .send(Message::Text(
                r#"{"type":"connect","url":"http://localhost/index.html"}"#.into(),
            ))
            .unwrap();
        socket
            .send(Message::Text(
                r#"{"type":"message","message":"{\"method\":\"ScriptAdded\"}"}"#.into(),
            ))
            .unwrap();

        let connect = rx.blocking_recv().unwrap().1;
        let TransportEvent::Connect { client, url } = connect else {
            panic!("expected connect, got {connect:?}");
        };
        assert_eq!(url, "http://localhost/index.html");
        assert_eq!(
            rx.blocking_recv().unwrap().1,
            TransportEvent::Message {
                client,
                text: r#"{"method":"ScriptAdded"}"#.into()
            }
        );

        transport.send(&[client], r#"{"method":"Page.reload"}"#);
        let reply = socket.read().unwrap();
        assert_eq!(reply.to_text().unwrap(), r#"{"method":"Page.reload"}"#);

        transport.close(client);
        assert_eq!(rx.blocking_recv().unwrap().1, TransportEvent::Close { client });
        transport.shutdown();
    }
}
