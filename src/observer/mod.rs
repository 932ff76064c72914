//! Page-side observer of script and stylesheet relations.
//!
//! Reports the external scripts and stylesheets of a live page, then every
//! addition and removal. Real browsers run the same algorithm from the
//! embedded `document_observer.js`; this implementation drives any engine
//! exposed through [`DomHost`].
//!
//! # State machine
//!
//! ```text
//! Uninitialized --start()--> Observing --stop()--> Stopped
//! ```
//!
//! Newly linked stylesheets are not in the engine's stylesheet list until
//! they load, so added links are polled with [`DocumentObserver::tick`]
//! up to a bounded number of attempts.

mod dom;
mod snapshot;

pub use dom::{DomHost, Mutation, Node, ObserverSink, StyleSheet};
pub use snapshot::{
    DocumentRelationSnapshot, SnapshotDelta, StylesheetChange, diff, stylesheet_roots,
};

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;

use crate::config::LiveSection;
use crate::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Uninitialized,
    Observing,
    Stopped,
}

/// Stylesheet polling limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from_config(&LiveSection::default())
    }
}

impl PollOptions {
    pub fn from_config(live: &LiveSection) -> Self {
        Self {
            interval: Duration::from_millis(live.stylesheet_poll_interval_ms),
            attempts: live.stylesheet_poll_attempts,
        }
    }

    /// Longest a newly linked stylesheet is waited for.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.attempts
    }
}

#[derive(Debug)]
struct PendingStylesheet {
    href: String,
    attempts: u32,
}

pub struct DocumentObserver<H, S> {
    state: ObserverState,
    attached: Option<(H, S)>,
    stylesheets: BTreeMap<String, Vec<String>>,
    pending: Vec<PendingStylesheet>,
    poll: PollOptions,
}

impl<H: DomHost, S: ObserverSink> Default for DocumentObserver<H, S> {
    fn default() -> Self {
        Self::new(PollOptions::default())
    }
}

impl<H: DomHost, S: ObserverSink> DocumentObserver<H, S> {
    pub fn new(poll: PollOptions) -> Self {
        Self {
            state: ObserverState::Uninitialized,
            attached: None,
            stylesheets: BTreeMap::new(),
            pending: Vec::new(),
            poll,
        }
    }

    pub fn state(&self) -> ObserverState {
        self.state
    }

    pub fn poll_options(&self) -> PollOptions {
        self.poll
    }

    /// Begin observing `host`, reporting through `sink`.
    ///
    /// Sends the full `DocumentRelated` snapshot first.
    pub fn start(&mut self, host: H, sink: S) {
        let related = DocumentRelationSnapshot::compute(&host);
        self.attached = Some((host, sink));
        self.state = ObserverState::Observing;
        self.pending.clear();
        self.send(json!({ "method": "DocumentRelated", "related": related }));
        self.stylesheets = related.stylesheets;
    }

    /// Stop reporting. Later mutations and ticks are ignored.
    pub fn stop(&mut self) {
        if self.state == ObserverState::Observing {
            self.state = ObserverState::Stopped;
            self.pending.clear();
        }
    }

    /// Current snapshot, recomputed from the host.
    pub fn related(&self) -> Option<DocumentRelationSnapshot> {
        self.attached
            .as_ref()
            .map(|(host, _)| DocumentRelationSnapshot::compute(host))
    }

    pub fn host(&self) -> Option<&H> {
        self.attached.as_ref().map(|(host, _)| host)
    }

    pub fn host_mut(&mut self) -> Option<&mut H> {
        self.attached.as_mut().map(|(host, _)| host)
    }

    pub fn sink(&self) -> Option<&S> {
        self.attached.as_ref().map(|(_, sink)| sink)
    }

    /// Stylesheet links still waiting to show up in the stylesheet list.
    pub fn pending_stylesheets(&self) -> Vec<&str> {
        self.pending.iter().map(|p| p.href.as_str()).collect()
    }

    /// Handle engine change notifications.
    pub fn on_mutations(&mut self, mutations: &[Mutation]) {
        if self.state != ObserverState::Observing {
            return;
        }
        for mutation in mutations {
            match mutation {
                Mutation::Batch { added, removed } => {
                    self.on_nodes_added(added);
                    self.on_nodes_removed(removed);
                }
                Mutation::Inserted(node) => self.on_nodes_added(std::slice::from_ref(node)),
                Mutation::Removed(node) => self.on_nodes_removed(std::slice::from_ref(node)),
            }
        }
    }

    fn on_nodes_added(&mut self, nodes: &[Node]) {
        for node in nodes {
            if let Some(src) = node.external_script() {
                self.send(json!({ "method": "ScriptAdded", "src": src }));
            }
            if let Some(href) = node.external_stylesheet() {
                self.pending.push(PendingStylesheet {
                    href: href.to_string(),
                    attempts: 0,
                });
            }
        }
    }

    fn on_nodes_removed(&mut self, nodes: &[Node]) {
        for node in nodes {
            if let Some(src) = node.external_script() {
                self.send(json!({ "method": "ScriptRemoved", "src": src }));
            }
            if node.external_stylesheet().is_some() {
                self.notify_stylesheets_removed();
            }
        }
    }

    /// One polling step for newly linked stylesheets.
    ///
    /// Returns how many links are still pending.
    pub fn tick(&mut self) -> usize {
        if self.state != ObserverState::Observing || self.pending.is_empty() {
            return self.pending.len();
        }
        let Some((host, _)) = &self.attached else {
            return self.pending.len();
        };

        let loaded: Vec<String> = host.stylesheets().into_iter().filter_map(|s| s.href).collect();
        let max_attempts = self.poll.attempts;
        let mut any_loaded = false;

        self.pending.retain_mut(|pending| {
            pending.attempts += 1;
            if loaded.contains(&pending.href) {
                any_loaded = true;
                return false;
            }
            if pending.attempts >= max_attempts {
                debug!("observer"; "gave up waiting for {} after {} polls", pending.href, pending.attempts);
                return false;
            }
            true
        });

        if any_loaded {
            self.notify_stylesheets_added();
        }
        self.pending.len()
    }

    fn recompute_stylesheets(&self) -> BTreeMap<String, Vec<String>> {
        self.attached
            .as_ref()
            .map(|(host, _)| stylesheet_roots(&host.stylesheets()))
            .unwrap_or_default()
    }

    fn notify_stylesheets_added(&mut self) {
        let next = self.recompute_stylesheets();
        let delta = diff(&self.stylesheets, &next);
        for change in delta.added {
            self.send(json!({
                "method": "StylesheetAdded",
                "href": change.href,
                "roots": change.roots,
            }));
        }
        self.stylesheets = next;
    }

    fn notify_stylesheets_removed(&mut self) {
        let next = self.recompute_stylesheets();
        let delta = diff(&self.stylesheets, &next);
        for change in delta.removed {
            // drop the <style> a stylesheet-text push put in its place
            if let Some((host, _)) = self.attached.as_mut() {
                host.remove_element_by_id(&change.href);
            }
            self.send(json!({
                "method": "StylesheetRemoved",
                "href": change.href,
                "roots": change.roots,
            }));
        }
        self.stylesheets = next;
    }

    fn send(&mut self, message: serde_json::Value) {
        if let Some((_, sink)) = self.attached.as_mut() {
            sink.send(&message.to_string());
        }
    }
}
