//! Editor-side collaborators of a live document.
//!
//! The editor itself lives outside this crate. These traits are the seams it
//! plugs into; notification methods hand back a [`Subscription`] that
//! unregisters the handler when dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::instrument::Pos;
use crate::protocol::{Emitter, Subscription};

/// A file open in the editor.
pub trait Document: Send + Sync {
    fn path(&self) -> PathBuf;
    /// URL the file is served at.
    fn url(&self) -> String;
    fn text(&self) -> String;
}

/// One selection; `reversed` when the cursor sits at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: Pos,
    pub end: Pos,
    pub reversed: bool,
}

impl Selection {
    pub const fn cursor(pos: Pos) -> Self {
        Self {
            start: pos,
            end: pos,
            reversed: false,
        }
    }

    /// Where the cursor is.
    pub const fn head(&self) -> Pos {
        if self.reversed { self.end } else { self.start }
    }
}

/// Opaque handle to a line class added by [`Editor::add_line_class`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineHandle(pub u64);

pub type CursorHandler = Box<dyn Fn(&()) + Send + Sync>;
pub type EditorChangeHandler = Box<dyn Fn(&Option<Arc<dyn Editor>>) + Send + Sync>;
pub type PreferenceHandler = Box<dyn Fn(&bool) + Send + Sync>;

/// A text editor showing some document.
pub trait Editor: Send + Sync {
    /// URL of the document being edited.
    fn document_url(&self) -> String;
    fn selections(&self) -> Vec<Selection>;
    fn add_line_class(&self, line: u32, class: &str) -> LineHandle;
    fn remove_line_class(&self, handle: LineHandle, class: &str);
    /// Run `f` as one batched editor transaction.
    fn operation(&self, f: &mut dyn FnMut());
    /// `data-brackets-id` of the HTML tag at `pos`, if any.
    fn tag_id_at(&self, pos: Pos) -> Option<u32>;
    fn on_cursor_activity(&self, handler: CursorHandler) -> Subscription;
}

/// The editor window: tracks which editor has focus.
pub trait EditorHost: Send + Sync {
    fn active_editor(&self) -> Option<Arc<dyn Editor>>;
    fn on_active_editor_change(&self, handler: EditorChangeHandler) -> Subscription;
}

/// The boolean "highlight enabled" preference.
pub trait HighlightPreference: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    fn on_change(&self, handler: PreferenceHandler) -> Subscription;
}

/// In-memory highlight preference.
#[derive(Clone)]
pub struct Preferences {
    highlight: Arc<AtomicBool>,
    changed: Emitter<bool>,
}

impl Preferences {
    pub fn new(highlight: bool) -> Self {
        Self {
            highlight: Arc::new(AtomicBool::new(highlight)),
            changed: Emitter::new(),
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new(true)
    }
}

impl HighlightPreference for Preferences {
    fn is_enabled(&self) -> bool {
        self.highlight.load(Ordering::SeqCst)
    }

    /// Notifies subscribers only when the value changes.
    fn set_enabled(&self, enabled: bool) {
        if self.highlight.swap(enabled, Ordering::SeqCst) != enabled {
            self.changed.emit(&enabled);
        }
    }

    fn on_change(&self, handler: PreferenceHandler) -> Subscription {
        self.changed.subscribe(handler)
    }
}
