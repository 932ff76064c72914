//! Byte offset to editor position conversion.
//!
//! oxc spans are byte offsets into the source. Editors address text by
//! zero-based line and zero-based column, where the column counts characters.

use serde::{Deserialize, Serialize};

/// Zero-based editor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub ch: u32,
}

impl Pos {
    pub const fn new(line: u32, ch: u32) -> Self {
        Self { line, ch }
    }
}

/// Start/end positions of a span of original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRange {
    pub start: Pos,
    pub end: Pos,
}

/// Line start table for one source string.
pub struct LineIndex<'s> {
    source: &'s str,
    /// Byte offset of the first character of every line
    line_starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    pub fn new(source: &'s str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    /// Convert a byte offset into a zero-based line/column position.
    ///
    /// Offsets past the end clamp to the end of the source.
    #[allow(clippy::cast_possible_truncation)]
    pub fn pos(&self, offset: usize) -> Pos {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let ch = self
            .source
            .get(line_start..offset)
            .map_or(0, |s| s.chars().count());
        Pos::new(line as u32, ch as u32)
    }

    /// Convert a zero-based position back into a byte offset.
    ///
    /// Returns `None` when the line or column is out of range.
    pub fn offset(&self, pos: Pos) -> Option<usize> {
        let line_start = *self.line_starts.get(pos.line as usize)?;
        let line_end = self
            .line_starts
            .get(pos.line as usize + 1)
            .map_or(self.source.len(), |next| next - 1);
        let line = self.source.get(line_start..line_end)?;

        let ch = pos.ch as usize;
        if ch == line.chars().count() {
            return Some(line_end);
        }
        line.char_indices()
            .nth(ch)
            .map(|(byte, _)| line_start + byte)
    }

    /// Slice the source between two positions (start inclusive, end exclusive).
    pub fn slice(&self, range: &FunctionRange) -> Option<&'s str> {
        let start = self.offset(range.start)?;
        let end = self.offset(range.end)?;
        self.source.get(start..end)
    }

    /// Build the range covering `start..end` byte offsets.
    pub fn range(&self, start: usize, end: usize) -> FunctionRange {
        FunctionRange {
            start: self.pos(start),
            end: self.pos(end),
        }
    }
}
