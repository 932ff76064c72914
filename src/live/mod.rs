//! Live documents: the editor side of a live development session.
//!
//! A [`LiveDocument`] wraps one open file and decides how its edits reach
//! the browser:
//!
//! | Kind | Served as                     | On change                          |
//! |------|-------------------------------|------------------------------------|
//! | Html | text with remote scripts      | error markers refreshed            |
//! | Css  | text                          | `CSS.setStylesheetText`            |
//! | Js   | instrumented text             | changed bodies pushed, or reload   |
//!
//! It also drives the browser highlight from the editor's cursors and marks
//! sync errors in the editor.

mod document;
mod errors;
mod highlight;
mod host;
mod related;

#[cfg(test)]
pub(crate) mod test_support;

pub use document::{DocumentConnection, IdBlocks, LiveDocument, LiveKind, Push};
pub use errors::{ErrorMarkers, SYNC_ERROR_CLASS, SyncError};
pub use highlight::{HighlightState, selector_at, tag_selector};
pub use host::{
    CursorHandler, Document, Editor, EditorChangeHandler, EditorHost, HighlightPreference,
    LineHandle, PreferenceHandler, Preferences, Selection,
};
pub use related::RelatedDocuments;
