//! Sync error markers in the editor.

use serde::Serialize;

use super::host::{Editor, LineHandle};
use crate::instrument::Pos;

/// Line class marking text that blocks reliable live editing.
pub const SYNC_ERROR_CLASS: &str = "live-preview-sync-error";

/// A range the browser cannot be kept in sync with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncError {
    pub start: Pos,
    pub end: Pos,
    pub message: String,
}

impl SyncError {
    pub fn new(start: Pos, end: Pos, message: impl Into<String>) -> Self {
        Self {
            start,
            end,
            message: message.into(),
        }
    }
}

/// Markers currently shown, tracked by the handle the editor returned.
#[derive(Debug, Default)]
pub struct ErrorMarkers {
    handles: Vec<LineHandle>,
}

impl ErrorMarkers {
    /// Replace the markers with one per line covered by `errors`, in a
    /// single editor transaction.
    pub fn show(&mut self, editor: &dyn Editor, errors: &[SyncError]) {
        editor.operation(&mut || {
            self.remove_all(editor);
            for error in errors {
                for line in error.start.line..=error.end.line {
                    self.handles.push(editor.add_line_class(line, SYNC_ERROR_CLASS));
                }
            }
        });
    }

    /// Remove exactly the markers added before. Nothing happens when none
    /// are shown.
    pub fn clear(&mut self, editor: &dyn Editor) {
        if self.handles.is_empty() {
            return;
        }
        editor.operation(&mut || self.remove_all(editor));
    }

    fn remove_all(&mut self, editor: &dyn Editor) {
        while let Some(handle) = self.handles.pop() {
            editor.remove_line_class(handle, SYNC_ERROR_CLASS);
        }
    }

    /// Markers lost with a detached editor.
    pub fn forget(&mut self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
