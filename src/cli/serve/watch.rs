//! File watcher feeding saved edits into the live site.
//!
//! ```text
//! notify → Debouncer (timing, dedup) → LiveSite::file_changed / file_removed
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use super::site::LiveSite;
use crate::{debug, log};

const DEBOUNCE_MS: u64 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChangeKind {
    Changed,
    Removed,
}

/// Editor artifacts that never become live documents.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Canonical form of a path that may no longer exist.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent().and_then(|p| p.canonicalize().ok()), path.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// Collects notify events until the burst settles.
pub(super) struct Debouncer {
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    delay: Duration,
}

impl Debouncer {
    pub(super) fn new(delay: Duration) -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            delay,
        }
    }

    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Changed,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => ChangeKind::Changed,
            _ => return,
        };
        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.record(normalize(path), kind);
        }
    }

    /// Latest event for a path wins.
    pub(super) fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        debug!("watch"; "{:?}: {}", kind, path.display());
        self.changes.insert(path, kind);
        self.last_event = Some(Instant::now());
    }

    pub(super) fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|last| last.elapsed() >= self.delay && !self.changes.is_empty())
    }

    pub(super) fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.changes))
    }

    /// Sleep until the pending burst could be ready.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last) = self.last_event else {
            return Duration::from_secs(86400);
        };
        self.delay
            .saturating_sub(last.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Watch `site.root()` and push changes until the notify channel closes.
pub async fn watch(site: Arc<LiveSite>) -> notify::Result<()> {
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    })?;
    watcher.watch(site.root(), RecursiveMode::Recursive)?;
    log!("watch"; "{}", site.root().display());

    let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);
    std::thread::spawn(move || {
        while let Ok(result) = notify_rx.recv() {
            match result {
                Ok(event) => {
                    if async_tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Err(e) => log!("watch"; "notify error: {}", e),
            }
        }
    });

    let mut debouncer = Debouncer::new(Duration::from_millis(DEBOUNCE_MS));
    loop {
        tokio::select! {
            biased;
            event = async_rx.recv() => match event {
                Some(event) => debouncer.add_event(&event),
                None => break,
            },
            () = tokio::time::sleep(debouncer.sleep_duration()) => {
                if let Some(changes) = debouncer.take_if_ready() {
                    apply(&site, changes);
                }
            }
        }
    }
    drop(watcher);
    Ok(())
}

fn apply(site: &LiveSite, changes: FxHashMap<PathBuf, ChangeKind>) {
    for (path, kind) in changes {
        match kind {
            ChangeKind::Changed => site.file_changed(&path),
            ChangeKind::Removed => site.file_removed(&path),
        }
    }
}
