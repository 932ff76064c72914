//! Per-file live document.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use url::Url;

use super::errors::{ErrorMarkers, SyncError};
use super::highlight::{HighlightState, selector_at, tag_selector};
use super::host::{Document, Editor, EditorHost, HighlightPreference};
use super::related::RelatedDocuments;
use crate::instrument::{IdCounter, Instrumented, LineIndex, Pos, instrument_with};
use crate::observer::DocumentRelationSnapshot;
use crate::protocol::{
    Emitter, ProtocolSession, ResponseFuture, SessionEvent, Subscription, Subscriptions,
};
use crate::transport::ClientId;
use crate::{debug, log};

/// IDs reserved for each JS document so pages loading several scripts
/// never see two functions with the same ID.
const JS_ID_BLOCK: u32 = 100_000;

/// Hands out a disjoint function ID range to each JS document of a site.
#[derive(Debug, Default)]
pub struct IdBlocks {
    next: AtomicU32,
}

impl IdBlocks {
    /// First ID of a fresh block.
    pub fn next_base(&self) -> u32 {
        self.next
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_mul(JS_ID_BLOCK)
    }
}

/// What [`LiveDocument::on_change`] sent.
#[derive(Debug)]
pub enum Push {
    /// A request the page answers
    Query(ResponseFuture),
    /// A command nobody answers, like `Page.reload`
    Command,
}

/// How edits to a file reach the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveKind {
    /// Served with the remote scripts injected
    Html,
    /// Pushed with `CSS.setStylesheetText`
    Css,
    /// Function bodies hot-swapped, reload when functions come or go
    Js,
}

impl LiveKind {
    /// Kind of a file by extension. `None` for files without live editing.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "css" => Some(Self::Css),
            "js" | "cjs" => Some(Self::Js),
            _ => None,
        }
    }
}

/// Whether a page showing this document is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentConnection {
    Detached,
    Connected,
}

struct Inner {
    kind: LiveKind,
    document: Arc<dyn Document>,
    session: ProtocolSession,
    preference: Arc<dyn HighlightPreference>,
    error_status: Emitter<bool>,
    state: Mutex<State>,
}

struct State {
    closed: bool,
    editor: Option<Arc<dyn Editor>>,
    cursor: Option<Subscription>,
    subscriptions: Subscriptions,
    highlight: HighlightState,
    errors: Vec<SyncError>,
    markers: ErrorMarkers,
    instrumentation: bool,
    clients: BTreeSet<ClientId>,
    related: RelatedDocuments,
    id_base: u32,
    instrumented: Option<Instrumented>,
}

/// One open file under live development.
///
/// Clones share the document. Dropping the last clone, or calling
/// [`LiveDocument::close`], unregisters every handler.
#[derive(Clone)]
pub struct LiveDocument {
    inner: Arc<Inner>,
}

impl LiveDocument {
    pub fn new(
        kind: LiveKind,
        document: Arc<dyn Document>,
        session: ProtocolSession,
        host: &dyn EditorHost,
        preference: Arc<dyn HighlightPreference>,
        ids: &IdBlocks,
    ) -> Self {
        let id_base = match kind {
            LiveKind::Js => ids.next_base(),
            _ => 0,
        };
        let this = Self {
            inner: Arc::new(Inner {
                kind,
                document,
                session,
                preference,
                error_status: Emitter::new(),
                state: Mutex::new(State {
                    closed: false,
                    editor: None,
                    cursor: None,
                    subscriptions: Subscriptions::default(),
                    highlight: HighlightState::default(),
                    errors: Vec::new(),
                    markers: ErrorMarkers::default(),
                    instrumentation: false,
                    clients: BTreeSet::new(),
                    related: RelatedDocuments::default(),
                    id_base,
                    instrumented: None,
                }),
            }),
        };

        let mut subscriptions = Subscriptions::default();
        let weak = Arc::downgrade(&this.inner);
        subscriptions.push(host.on_active_editor_change(Box::new({
            let weak = weak.clone();
            move |editor| {
                if let Some(doc) = upgrade(&weak) {
                    doc.on_active_editor_change(editor.clone());
                }
            }
        })));
        subscriptions.push(this.inner.preference.on_change(Box::new({
            let weak = weak.clone();
            move |_| {
                if let Some(doc) = upgrade(&weak) {
                    doc.on_highlight_pref_change();
                }
            }
        })));
        subscriptions.push(this.inner.session.subscribe(move |event| {
            if let Some(doc) = upgrade(&weak) {
                doc.on_session_event(event);
            }
        }));
        this.inner.state.lock().subscriptions = subscriptions;

        if let Some(editor) = host.active_editor() {
            this.on_active_editor_change(Some(editor));
        }
        this
    }

    pub fn kind(&self) -> LiveKind {
        self.inner.kind
    }

    pub fn url(&self) -> String {
        self.inner.document.url()
    }

    pub fn path(&self) -> PathBuf {
        self.inner.document.path()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop live editing: clear error markers, detach from the editor and
    /// drop every subscription. Later calls do nothing.
    pub fn close(&self) {
        let subscriptions = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            if let Some(editor) = state.editor.clone() {
                state.markers.clear(editor.as_ref());
            }
            std::mem::take(&mut state.subscriptions)
        };
        self.detach_from_editor();
        drop(subscriptions);
        debug!("live"; "closed {}", self.url());
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Whether edits show up in the browser without a reload.
    pub fn is_live_editing_enabled(&self) -> bool {
        match self.inner.kind {
            LiveKind::Html => self.inner.state.lock().instrumentation,
            LiveKind::Css | LiveKind::Js => true,
        }
    }

    /// Turn remote script injection on or off. Only HTML documents are
    /// instrumented this way.
    pub fn set_instrumentation_enabled(&self, enabled: bool) {
        if self.inner.kind == LiveKind::Html {
            self.inner.state.lock().instrumentation = enabled;
        }
    }

    /// Body served to the browser for this file.
    pub fn response_data(&self) -> String {
        let text = self.inner.document.text();
        match self.inner.kind {
            LiveKind::Css => text,
            LiveKind::Html => {
                if self.inner.state.lock().instrumentation {
                    inject_after_head(&text, &self.inner.session.get_remote_script())
                } else {
                    text
                }
            }
            LiveKind::Js => {
                let mut state = self.inner.state.lock();
                let mut counter = IdCounter::starting_at(state.id_base);
                match instrument_with(&text, &mut counter) {
                    Ok(instrumented) => {
                        let code = instrumented.code.clone();
                        state.instrumented = Some(instrumented);
                        code
                    }
                    Err(err) => {
                        log!("live"; "serving {} uninstrumented: {}", self.url(), err);
                        text
                    }
                }
            }
        }
    }

    /// Push the document's current text to every page.
    pub fn on_change(&self) -> Option<Push> {
        self.on_change_for(None)
    }

    /// Push the document's current text to `clients`, or every page when
    /// `None`. Returns what was sent, if anything.
    pub fn on_change_for(&self, clients: Option<&[ClientId]>) -> Option<Push> {
        match self.inner.kind {
            LiveKind::Css => {
                let text = self.inner.document.text();
                let future = self.inner.session.set_stylesheet_text(&self.url(), &text, clients);
                Some(Push::Query(future))
            }
            LiveKind::Js => self.push_script(clients),
            LiveKind::Html => {
                self.refresh_error_display();
                None
            }
        }
    }

    fn push_script(&self, clients: Option<&[ClientId]>) -> Option<Push> {
        let text = self.inner.document.text();
        let id_base = self.inner.state.lock().id_base;
        let next = match instrument_with(&text, &mut IdCounter::starting_at(id_base)) {
            Ok(next) => next,
            Err(err) => {
                // the whole script is out of sync until it parses again
                let end = LineIndex::new(&text).pos(text.len());
                self.set_errors(vec![SyncError::new(Pos::new(0, 0), end, err.message)]);
                return None;
            }
        };
        self.clear_errors();

        let previous = self.inner.state.lock().instrumented.replace(next.clone());
        let session = &self.inner.session;
        match previous {
            // bodies run with the served header, so only they may differ
            Some(previous) if next.same_functions(&previous) && next.same_outline(&previous) => {
                let changes: serde_json::Map<String, serde_json::Value> = next
                    .changed_bodies(&previous)
                    .into_iter()
                    .map(|(id, body)| (id.to_string(), body.into()))
                    .collect();
                if changes.is_empty() {
                    return None;
                }
                debug!("live"; "hot-swapping {} functions in {}", changes.len(), self.url());
                let expression = format!(
                    "__LiveDev.update({})",
                    serde_json::Value::Object(changes)
                );
                Some(Push::Query(session.evaluate(&expression, clients)))
            }
            _ => {
                debug!("live"; "script {} changed outside function bodies, reloading", self.url());
                let params = serde_json::json!({ "ignoreCache": false });
                match session.notify("Page.reload", params, clients) {
                    Ok(()) => Some(Push::Command),
                    Err(err) => {
                        log!("live"; "cannot reload for {}: {}", self.url(), err);
                        None
                    }
                }
            }
        }
    }

    // ========================================================================
    // Editor attachment
    // ========================================================================

    fn on_active_editor_change(&self, editor: Option<Arc<dyn Editor>>) {
        let url = self.url();
        match editor {
            Some(editor) if editor.document_url() == url => self.attach_to_editor(editor),
            _ => self.detach_from_editor(),
        }
    }

    fn attach_to_editor(&self, editor: Arc<dyn Editor>) {
        {
            let state = self.inner.state.lock();
            if state.closed
                || state
                    .editor
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, &editor))
            {
                return;
            }
        }
        self.detach_from_editor();

        let weak = Arc::downgrade(&self.inner);
        let cursor = editor.on_cursor_activity(Box::new(move |_| {
            if let Some(doc) = upgrade(&weak) {
                doc.update_highlight();
            }
        }));
        {
            let mut state = self.inner.state.lock();
            state.editor = Some(editor);
            state.cursor = Some(cursor);
        }
        self.refresh_error_display();
        self.update_highlight();
    }

    fn detach_from_editor(&self) {
        let Some(editor) = self.inner.state.lock().editor.clone() else {
            return;
        };
        self.hide_highlight(false);
        let mut state = self.inner.state.lock();
        state.markers.clear(editor.as_ref());
        state.cursor = None;
        state.editor = None;
    }

    pub fn has_editor(&self) -> bool {
        self.inner.state.lock().editor.is_some()
    }

    // ========================================================================
    // Highlighting
    // ========================================================================

    fn is_highlight_enabled(&self) -> bool {
        self.inner.preference.is_enabled()
    }

    fn on_highlight_pref_change(&self) {
        if self.is_highlight_enabled() {
            self.update_highlight();
        } else {
            self.hide_highlight(false);
        }
    }

    /// Highlight what the editor's cursors are on.
    pub fn update_highlight(&self) {
        if !self.is_highlight_enabled() {
            return;
        }
        let Some(editor) = self.inner.state.lock().editor.clone() else {
            return;
        };
        let heads = editor.selections().into_iter().map(|sel| sel.head());

        match self.inner.kind {
            LiveKind::Css => {
                let text = self.inner.document.text();
                let selectors: Vec<String> =
                    heads.filter_map(|pos| selector_at(&text, pos)).collect();
                if selectors.is_empty() {
                    self.hide_highlight(false);
                } else {
                    self.highlight_rule(&selectors.join(","));
                }
            }
            LiveKind::Html => {
                let ids: Vec<u32> = heads.filter_map(|pos| editor.tag_id_at(pos)).collect();
                if ids.is_empty() {
                    self.hide_highlight(false);
                } else {
                    self.highlight_dom_element(&ids);
                }
            }
            LiveKind::Js => {}
        }
    }

    /// Highlight every element matching `selector`. Repeats of the last
    /// selector are not sent again.
    pub fn highlight_rule(&self, selector: &str) {
        if !self.inner.state.lock().highlight.begin(selector) {
            return;
        }
        let quoted = serde_json::Value::from(selector).to_string();
        self.evaluate(&format!("_LD.highlightRule({quoted})"));
    }

    /// Highlight the elements tagged with any of `ids`.
    pub fn highlight_dom_element(&self, ids: &[u32]) {
        self.highlight_rule(&tag_selector(ids));
    }

    /// Hide the browser highlight. A `temporary` hide keeps the last
    /// selector, so highlighting it again is still deduplicated.
    pub fn hide_highlight(&self, temporary: bool) {
        if !temporary {
            self.inner.state.lock().highlight.forget();
        }
        self.evaluate(if temporary {
            "_LD.hideHighlight(true)"
        } else {
            "_LD.hideHighlight()"
        });
    }

    pub fn redraw_highlights(&self) {
        if self.is_highlight_enabled() {
            self.evaluate("_LD.redrawHighlights()");
        }
    }

    /// The editor window regained focus; the page may have changed meanwhile.
    pub fn on_window_focus(&self) {
        if self.is_highlight_enabled() {
            self.redraw_highlights();
            self.update_highlight();
        } else {
            self.hide_highlight(false);
        }
    }

    pub fn last_highlight(&self) -> Option<String> {
        self.inner.state.lock().highlight.last().map(str::to_string)
    }

    fn evaluate(&self, expression: &str) {
        let params = serde_json::json!({ "expression": expression });
        if let Err(err) = self.inner.session.notify("Runtime.evaluate", params, None) {
            debug!("live"; "highlight not sent: {}", err);
        }
    }

    // ========================================================================
    // Sync errors
    // ========================================================================

    /// Replace the sync errors and mark them in the attached editor.
    pub fn set_errors(&self, errors: Vec<SyncError>) {
        let had_errors = {
            let mut state = self.inner.state.lock();
            let had = !state.errors.is_empty();
            state.errors = errors;
            had
        };
        self.refresh_error_display();
        let has_errors = self.has_errors();
        if had_errors != has_errors {
            self.inner.error_status.emit(&has_errors);
        }
    }

    pub fn clear_errors(&self) {
        self.set_errors(Vec::new());
    }

    pub fn errors(&self) -> Vec<SyncError> {
        self.inner.state.lock().errors.clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.inner.state.lock().errors.is_empty()
    }

    /// Fires with `true`/`false` when the document gains or loses errors.
    pub fn error_status(&self) -> &Emitter<bool> {
        &self.inner.error_status
    }

    fn refresh_error_display(&self) {
        let mut state = self.inner.state.lock();
        let Some(editor) = state.editor.clone() else {
            return;
        };
        let errors = std::mem::take(&mut state.errors);
        if errors.is_empty() {
            state.markers.clear(editor.as_ref());
        } else {
            state.markers.show(editor.as_ref(), &errors);
        }
        state.errors = errors;
    }

    // ========================================================================
    // Connection and related documents
    // ========================================================================

    fn on_session_event(&self, event: &SessionEvent) {
        let url = self.url();
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        match event {
            SessionEvent::ConnectionConnect { client_id, url: page } if same_page(page, &url) => {
                if state.clients.insert(*client_id) && state.clients.len() == 1 {
                    log!("live"; "{} connected", url);
                }
            }
            SessionEvent::ConnectionClose { client_id } => {
                if state.clients.remove(client_id) && state.clients.is_empty() {
                    debug!("live"; "{} detached", url);
                }
            }
            SessionEvent::Remote(remote)
                if self.inner.kind == LiveKind::Html && state.clients.contains(&remote.client_id) =>
            {
                state.related.apply(remote);
            }
            _ => {}
        }
    }

    pub fn connection_state(&self) -> DocumentConnection {
        if self.inner.state.lock().clients.is_empty() {
            DocumentConnection::Detached
        } else {
            DocumentConnection::Connected
        }
    }

    /// Pages currently showing this document.
    pub fn clients(&self) -> Vec<ClientId> {
        self.inner.state.lock().clients.iter().copied().collect()
    }

    /// Whether the page loads `url` as a script or stylesheet.
    pub fn is_related(&self, url: &str) -> bool {
        self.inner.state.lock().related.is_related(url)
    }

    pub fn related(&self) -> DocumentRelationSnapshot {
        self.inner.state.lock().related.snapshot().clone()
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<LiveDocument> {
    weak.upgrade().map(|inner| LiveDocument { inner })
}

/// Page URLs match ignoring query and fragment.
fn same_page(a: &str, b: &str) -> bool {
    fn page(url: &str) -> Option<Url> {
        let mut url = Url::parse(url).ok()?;
        url.set_query(None);
        url.set_fragment(None);
        Some(url)
    }
    fn strip(url: &str) -> &str {
        url.split(['?', '#']).next().unwrap_or(url)
    }
    match (page(a), page(b)) {
        (Some(a), Some(b)) => a == b,
        _ => strip(a) == strip(b),
    }
}

/// Insert `script` right after the `<head>` tag, or at the very start when
/// the page has no head.
fn inject_after_head(html: &str, script: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let head_end = lower
        .match_indices("<head")
        .find(|(at, _)| {
            matches!(
                lower.as_bytes().get(at + 5),
                Some(b'>' | b' ' | b'\t' | b'\n' | b'\r')
            )
        })
        .and_then(|(at, _)| lower[at..].find('>').map(|end| at + end + 1));

    match head_end {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..at]);
            out.push_str(script);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{script}{html}"),
    }
}
