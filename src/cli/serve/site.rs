//! Live documents for files served from disk.
//!
//! Files are opened as live documents the first time a page requests them.
//! There is no editor in serve mode; edits arrive through the watcher.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::live::{
    Document, Editor, EditorChangeHandler, EditorHost, IdBlocks, LiveDocument, LiveKind,
    Preferences,
};
use crate::logger::{status_error, status_success};
use crate::protocol::{Emitter, ProtocolSession, Subscription};
use crate::transport::ClientId;
use crate::{debug, log};

/// A file on disk. Keeps the last readable text so a half-written save
/// does not blank the page.
struct FileDocument {
    path: PathBuf,
    url: String,
    last: Mutex<String>,
}

impl Document for FileDocument {
    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn text(&self) -> String {
        let mut last = self.last.lock();
        match fs::read_to_string(&self.path) {
            Ok(text) => *last = text,
            Err(err) => log!("live"; "cannot read {}: {}", self.path.display(), err),
        }
        last.clone()
    }
}

/// Editor host without editors.
#[derive(Default)]
struct NoEditors {
    changed: Emitter<Option<Arc<dyn Editor>>>,
}

impl EditorHost for NoEditors {
    fn active_editor(&self) -> Option<Arc<dyn Editor>> {
        None
    }

    fn on_active_editor_change(&self, handler: EditorChangeHandler) -> Subscription {
        self.changed.subscribe(handler)
    }
}

struct Entry {
    document: LiveDocument,
    _status: Subscription,
}

/// Every file opened for live editing, keyed by canonical path.
pub struct LiveSite {
    root: PathBuf,
    session: ProtocolSession,
    host: NoEditors,
    preference: Arc<Preferences>,
    ids: IdBlocks,
    documents: Mutex<FxHashMap<PathBuf, Entry>>,
}

impl LiveSite {
    pub fn new(root: PathBuf, session: ProtocolSession, highlight: bool) -> Self {
        Self {
            root,
            session,
            host: NoEditors::default(),
            preference: Arc::new(Preferences::new(highlight)),
            ids: IdBlocks::default(),
            documents: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session(&self) -> &ProtocolSession {
        &self.session
    }

    /// Live document for `path`, opened at `url` on first use. `None` for
    /// files that are served as-is.
    pub fn document(&self, path: &Path, url: &str) -> Option<LiveDocument> {
        let kind = LiveKind::from_path(path)?;
        let mut documents = self.documents.lock();
        if let Some(entry) = documents.get(path) {
            return Some(entry.document.clone());
        }

        let file = Arc::new(FileDocument {
            path: path.to_path_buf(),
            url: url.to_string(),
            last: Mutex::new(String::new()),
        });
        let document = LiveDocument::new(
            kind,
            file,
            self.session.clone(),
            &self.host,
            Arc::clone(&self.preference) as Arc<dyn crate::live::HighlightPreference>,
            &self.ids,
        );
        if kind == LiveKind::Html {
            document.set_instrumentation_enabled(true);
        }

        let status = document.error_status().subscribe({
            let url = url.to_string();
            move |has_errors| {
                if *has_errors {
                    status_error("sync error", &url);
                } else {
                    status_success(&format!("{url} in sync"));
                }
            }
        });
        debug!("live"; "opened {} as {:?}", url, kind);
        documents.insert(
            path.to_path_buf(),
            Entry {
                document: document.clone(),
                _status: status,
            },
        );
        Some(document)
    }

    /// The already opened document for `path`.
    pub fn opened(&self, path: &Path) -> Option<LiveDocument> {
        self.documents.lock().get(path).map(|entry| entry.document.clone())
    }

    /// Push a changed file to the pages using it.
    pub fn file_changed(&self, path: &Path) {
        let Some(document) = self.opened(path) else {
            debug!("watch"; "{} is not open", path.display());
            return;
        };
        match document.kind() {
            LiveKind::Css | LiveKind::Js => {
                let url = document.url();
                let clients = self.related_clients(&url);
                if clients.is_empty() {
                    debug!("live"; "no page uses {}", url);
                    return;
                }
                document.on_change_for(Some(&clients));
            }
            LiveKind::Html => {
                document.on_change();
                let clients = document.clients();
                if !clients.is_empty() {
                    log!("live"; "reloading {}", document.url());
                    let params = serde_json::json!({ "ignoreCache": false });
                    if let Err(err) = self.session.notify("Page.reload", params, Some(&clients)) {
                        log!("live"; "cannot reload {}: {}", document.url(), err);
                    }
                }
            }
        }
    }

    /// Pages whose HTML document loads `url`.
    fn related_clients(&self, url: &str) -> Vec<ClientId> {
        let pages: Vec<LiveDocument> = self
            .documents
            .lock()
            .values()
            .filter(|entry| entry.document.kind() == LiveKind::Html)
            .map(|entry| entry.document.clone())
            .collect();
        let mut clients: Vec<ClientId> = pages
            .iter()
            .filter(|page| page.is_related(url))
            .flat_map(LiveDocument::clients)
            .collect();
        clients.sort_unstable();
        clients.dedup();
        clients
    }

    /// Close the document of a deleted file.
    pub fn file_removed(&self, path: &Path) {
        if let Some(entry) = self.documents.lock().remove(path) {
            entry.document.close();
            debug!("live"; "closed {}", path.display());
        }
    }

    pub fn open_count(&self) -> usize {
        self.documents.lock().len()
    }

    /// Close every document.
    pub fn close_all(&self) {
        let entries: Vec<Entry> = self.documents.lock().drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            entry.document.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ClientId, MemoryTransport};

    fn site(dir: &Path) -> (LiveSite, Arc<MemoryTransport>) {
        let session = ProtocolSession::default();
        let transport = Arc::new(MemoryTransport::new());
        session.set_transport(transport.clone()).unwrap();
        (LiveSite::new(dir.to_path_buf(), session, true), transport)
    }

    #[test]
    fn test_documents_opened_once_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("a.css");
        let png = dir.path().join("a.png");
        fs::write(&css, "p {}").unwrap();
        let (site, _) = site(dir.path());

        let first = site.document(&css, "http://h/a.css").unwrap();
        let second = site.document(&css, "http://h/other.css").unwrap();
        assert_eq!(second.url(), first.url());
        assert!(site.document(&png, "http://h/a.png").is_none());
        assert_eq!(site.open_count(), 1);
    }

    #[test]
    fn test_html_documents_inject_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("index.html");
        fs::write(&html, "<head></head>").unwrap();
        let (site, _) = site(dir.path());

        let doc = site.document(&html, "http://h/").unwrap();
        assert!(doc.response_data().contains("<script>"));
    }

    /// Open `page` and connect client `id` to it, loading `related`.
    fn open_page(
        site: &LiveSite,
        transport: &MemoryTransport,
        page: &Path,
        url: &str,
        id: u64,
        related: serde_json::Value,
    ) {
        fs::write(page, "<head></head>").unwrap();
        site.document(page, url);
        transport.connect(ClientId(id), url);
        transport.receive(
            ClientId(id),
            &serde_json::json!({ "method": "DocumentRelated", "related": related }).to_string(),
        );
        site.session().pump();
    }

    #[test]
    fn test_css_change_pushes_new_text() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("a.css");
        fs::write(&css, "p {}").unwrap();
        let (site, transport) = site(dir.path());
        site.document(&css, "http://h/a.css");
        open_page(
            &site,
            &transport,
            &dir.path().join("index.html"),
            "http://h/index.html",
            1,
            serde_json::json!({ "scripts": {}, "stylesheets": { "http://h/a.css": [] } }),
        );

        fs::write(&css, "p { color: red; }").unwrap();
        site.file_changed(&css);

        let sent = transport.last_sent().unwrap();
        let msg = sent.json();
        assert_eq!(msg["method"], "CSS.setStylesheetText");
        assert_eq!(msg["params"]["text"], "p { color: red; }");
        assert_eq!(sent.clients, vec![ClientId(1)]);
    }

    #[test]
    fn test_unused_css_change_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("a.css");
        fs::write(&css, "p {}").unwrap();
        let (site, transport) = site(dir.path());
        site.document(&css, "http://h/a.css");
        transport.take_sent();

        fs::write(&css, "p { color: red; }").unwrap();
        site.file_changed(&css);
        assert!(transport.take_sent().is_empty());
    }

    #[test]
    fn test_script_change_reloads_only_pages_using_it() {
        let dir = tempfile::tempdir().unwrap();
        let js = dir.path().join("app.js");
        fs::write(&js, "function f() { return 1; }").unwrap();
        let (site, transport) = site(dir.path());
        site.document(&js, "http://h/app.js").unwrap().response_data();
        open_page(
            &site,
            &transport,
            &dir.path().join("index.html"),
            "http://h/index.html",
            1,
            serde_json::json!({ "scripts": { "http://h/app.js": true }, "stylesheets": {} }),
        );
        open_page(
            &site,
            &transport,
            &dir.path().join("other.html"),
            "http://h/other.html",
            2,
            serde_json::json!({ "scripts": {}, "stylesheets": {} }),
        );
        transport.take_sent();

        // a new function cannot be hot-swapped
        fs::write(&js, "function f() { return 1; }\nfunction g() {}").unwrap();
        site.file_changed(&js);

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].json()["method"], "Page.reload");
        assert_eq!(sent[0].clients, vec![ClientId(1)]);
    }

    #[test]
    fn test_html_change_reloads_its_pages() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("index.html");
        fs::write(&html, "<p>").unwrap();
        let (site, transport) = site(dir.path());
        site.document(&html, "http://h/index.html");

        transport.connect(ClientId(1), "http://h/index.html");
        transport.connect(ClientId(2), "http://h/other.html");
        site.session().pump();

        site.file_changed(&html);
        let sent = transport.last_sent().unwrap();
        assert_eq!(sent.json()["method"], "Page.reload");
        assert_eq!(sent.clients, vec![ClientId(1)]);
    }

    #[test]
    fn test_unreadable_file_keeps_last_text() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("a.css");
        fs::write(&css, "p {}").unwrap();
        let (site, _) = site(dir.path());
        let doc = site.document(&css, "http://h/a.css").unwrap();
        assert_eq!(doc.response_data(), "p {}");

        fs::remove_file(&css).unwrap();
        assert_eq!(doc.response_data(), "p {}");

        site.file_removed(&css);
        assert!(doc.is_closed());
        assert_eq!(site.open_count(), 0);
    }
}
