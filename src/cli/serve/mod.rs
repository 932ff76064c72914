//! Development server: serves a directory and keeps its pages live.
//!
//! HTML pages get the remote scripts injected, JavaScript is served
//! instrumented, and saved edits are pushed over the protocol session.

mod lifecycle;
mod mime;
mod path;
mod response;
mod site;
mod watch;

pub use lifecycle::setup_shutdown_handler;
pub use site::LiveSite;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};
use tiny_http::{Request, Server};

use crate::config::cfg;
use crate::protocol::{ProtocolSession, SessionOptions};
use crate::transport::WsTransport;
use crate::{debug, log};

/// Serve the configured root until Ctrl+C.
pub fn serve() -> Result<()> {
    let config = cfg();
    let root = config
        .serve
        .root
        .canonicalize()
        .with_context(|| format!("cannot serve {}", config.serve.root.display()))?;

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let transport = Arc::new(WsTransport::bind(
        &config.serve.interface.to_string(),
        config.serve.ws_port,
    )?);
    debug!("ws"; "{}", transport.url());

    let session = ProtocolSession::new(SessionOptions::from_config(&config.live));
    session.set_transport(transport)?;
    let site = Arc::new(LiveSite::new(root, session, config.live.highlight));

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    lifecycle::register_server(Arc::clone(&server), shutdown_tx);
    let handle = spawn_session(Arc::clone(&site), config.serve.watch, shutdown_rx)?;

    log!("serve"; "http://{}", addr);
    run_request_loop(&server, &site, addr);

    site.close_all();
    lifecycle::wait_for_shutdown(handle);
    Ok(())
}

/// Run the session loop and the watcher on their own runtime until shutdown.
fn spawn_session(
    site: Arc<LiveSite>,
    watch_enabled: bool,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    Ok(thread::spawn(move || {
        rt.block_on(async move {
            let session = site.session().clone();
            let runner = tokio::spawn({
                let session = session.clone();
                async move { session.run().await }
            });
            let watcher = watch_enabled.then(|| {
                let site = Arc::clone(&site);
                tokio::spawn(async move {
                    if let Err(e) = watch::watch(site).await {
                        log!("watch"; "error: {}", e);
                    }
                })
            });

            let _ = tokio::task::spawn_blocking(move || shutdown_rx.recv()).await;
            session.shutdown();
            let _ = runner.await;
            if let Some(watcher) = watcher {
                watcher.abort();
            }
        });
    }))
}

fn run_request_loop(server: &Server, site: &LiveSite, addr: SocketAddr) {
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, site, addr) {
            log!("serve"; "request error: {e}");
        }
    }
}

fn handle_request(request: Request, site: &LiveSite, addr: SocketAddr) -> Result<()> {
    if lifecycle::is_shutdown() {
        return response::respond_unavailable(request);
    }
    let Some(path) = path::resolve_path(request.url(), site.root()) else {
        debug!("serve"; "404 {}", request.url());
        return response::respond_not_found(request);
    };

    let url = page_url(&request, addr);
    match site.document(&path, &url) {
        Some(document) => {
            let text = document.response_data();
            response::respond_live(request, &path, text)
        }
        None => response::respond_file(request, &path),
    }
}

/// Absolute URL of the request as the page sees it.
fn page_url(request: &Request, addr: SocketAddr) -> String {
    let host = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Host"))
        .map(|h| h.value.to_string())
        .unwrap_or_else(|| addr.to_string());
    let target = request.url();
    let end = target.find(['?', '#']).unwrap_or(target.len());
    format!("http://{}{}", host, &target[..end])
}
