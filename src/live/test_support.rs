//! In-memory editor, editor host and document for live document tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use super::host::{
    CursorHandler, Document, Editor, EditorChangeHandler, EditorHost, LineHandle, Selection,
};
use crate::instrument::Pos;
use crate::protocol::{Emitter, Subscription};

pub struct FakeDocument {
    path: PathBuf,
    url: String,
    text: Mutex<String>,
}

impl FakeDocument {
    pub fn new(path: &str, url: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            path: PathBuf::from(path),
            url: url.to_string(),
            text: Mutex::new(text.to_string()),
        })
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }
}

impl Document for FakeDocument {
    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn text(&self) -> String {
        self.text.lock().clone()
    }
}

#[derive(Default)]
struct EditorState {
    selections: Vec<Selection>,
    lines: BTreeMap<u64, u32>,
    next_handle: u64,
    operations: usize,
    tag_ids: BTreeMap<Pos, u32>,
}

pub struct FakeEditor {
    url: String,
    state: Mutex<EditorState>,
    cursor: Emitter<()>,
}

impl FakeEditor {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: Mutex::new(EditorState::default()),
            cursor: Emitter::new(),
        }
    }

    pub fn shared(url: &str) -> Arc<Self> {
        Arc::new(Self::new(url))
    }

    pub fn set_tag_id(&self, pos: Pos, id: u32) {
        self.state.lock().tag_ids.insert(pos, id);
    }

    /// Put single cursors at `positions` and report cursor activity.
    pub fn move_cursors(&self, positions: &[Pos]) {
        self.state.lock().selections = positions.iter().copied().map(Selection::cursor).collect();
        self.cursor.emit(&());
    }

    pub fn marked_lines(&self) -> Vec<u32> {
        let mut lines: Vec<u32> = self.state.lock().lines.values().copied().collect();
        lines.sort_unstable();
        lines
    }

    pub fn operations(&self) -> usize {
        self.state.lock().operations
    }

    pub fn cursor_subscribers(&self) -> usize {
        self.cursor.subscriber_count()
    }
}

impl Editor for FakeEditor {
    fn document_url(&self) -> String {
        self.url.clone()
    }

    fn selections(&self) -> Vec<Selection> {
        self.state.lock().selections.clone()
    }

    fn add_line_class(&self, line: u32, _class: &str) -> LineHandle {
        let mut state = self.state.lock();
        let handle = state.next_handle;
        state.next_handle += 1;
        state.lines.insert(handle, line);
        LineHandle(handle)
    }

    fn remove_line_class(&self, handle: LineHandle, _class: &str) {
        self.state.lock().lines.remove(&handle.0);
    }

    fn operation(&self, f: &mut dyn FnMut()) {
        self.state.lock().operations += 1;
        f();
    }

    fn tag_id_at(&self, pos: Pos) -> Option<u32> {
        self.state.lock().tag_ids.get(&pos).copied()
    }

    fn on_cursor_activity(&self, handler: CursorHandler) -> Subscription {
        self.cursor.subscribe(handler)
    }
}

#[derive(Default)]
pub struct FakeHost {
    active: Mutex<Option<Arc<dyn Editor>>>,
    changed: Emitter<Option<Arc<dyn Editor>>>,
}

impl FakeHost {
    pub fn activate(&self, editor: Option<Arc<dyn Editor>>) {
        *self.active.lock() = editor.clone();
        self.changed.emit(&editor);
    }

    pub fn subscribers(&self) -> usize {
        self.changed.subscriber_count()
    }
}

impl EditorHost for FakeHost {
    fn active_editor(&self) -> Option<Arc<dyn Editor>> {
        self.active.lock().clone()
    }

    fn on_active_editor_change(&self, handler: EditorChangeHandler) -> Subscription {
        self.changed.subscribe(handler)
    }
}
