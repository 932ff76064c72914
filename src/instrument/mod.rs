//! JavaScript instrumentation for function hot-swapping.
//!
//! Every non-generator, non-async function gets a registration wrapper as the
//! first statement of its body. In the browser the wrapper asks
//! `window.__LiveDev` for a replacement body and runs it instead of the
//! original when one has been pushed.
//!
//! # Output
//!
//! - `code` - the rewritten source
//! - `ids` - function ID to the original (uninstrumented) function span
//! - `bodies` - function ID to its instrumented body, without its own wrapper
//!
//! IDs are allocated children first, so a nested function always has a
//! smaller ID than the function that contains it.

mod position;
mod walk;

pub use position::{FunctionRange, LineIndex, Pos};

use std::collections::BTreeMap;

use oxc::allocator::Allocator;
use oxc::parser::Parser;
use oxc::span::SourceType;
use serde::Serialize;
use thiserror::Error;

use crate::debug;
use crate::embed::instrument::{FUNCTION_WRAPPER, WrapperVars};
use walk::FunctionNode;

/// Source that could not be parsed. Nothing partial is produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    /// Position of the first labelled span, when the parser reported one
    pub pos: Option<Pos>,
}

/// Sequential function ID source.
///
/// `instrument()` uses a fresh counter per call. Share one across
/// `instrument_with()` calls when IDs must be unique across files.
#[derive(Debug, Default, Clone)]
pub struct IdCounter {
    next: u32,
}

impl IdCounter {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Counter whose first allocation is `first`.
    pub const fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    /// Allocate the next ID.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The ID the next allocation will return.
    pub const fn peek(&self) -> u32 {
        self.next
    }

    /// Restart numbering at 0. Test isolation only.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Result of one instrumentation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Instrumented {
    pub code: String,
    pub ids: BTreeMap<u32, FunctionRange>,
    #[serde(skip)]
    pub bodies: BTreeMap<u32, String>,
    /// Source text from each function's start up to its body
    #[serde(skip)]
    pub headers: BTreeMap<u32, String>,
    /// Source with the bodies of top-level functions left out
    #[serde(skip)]
    pub outline: String,
}

impl Instrumented {
    /// Whether `other` has the same functions with the same headers.
    ///
    /// Ranges are not compared; they move whenever text is edited. A body
    /// swapped in under a changed header would see the old parameters.
    pub fn same_functions(&self, other: &Self) -> bool {
        self.ids.keys().eq(other.ids.keys()) && self.headers == other.headers
    }

    /// Whether the text outside function bodies is unchanged.
    pub fn same_outline(&self, other: &Self) -> bool {
        self.outline == other.outline
    }

    /// IDs whose instrumented body differs from `previous`.
    pub fn changed_bodies<'a>(&'a self, previous: &Self) -> Vec<(u32, &'a str)> {
        self.bodies
            .iter()
            .filter(|(id, body)| previous.bodies.get(id) != Some(*body))
            .map(|(id, body)| (*id, body.as_str()))
            .collect()
    }
}

/// Instrument `source` with a fresh ID counter.
pub fn instrument(source: &str) -> Result<Instrumented, ParseError> {
    instrument_with(source, &mut IdCounter::new())
}

/// Instrument `source`, allocating IDs from `counter`.
pub fn instrument_with(source: &str, counter: &mut IdCounter) -> Result<Instrumented, ParseError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    let index = LineIndex::new(source);

    if let Some(err) = ret.errors.first() {
        let pos = err
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| index.pos(label.offset()));
        return Err(ParseError {
            message: err.to_string(),
            pos,
        });
    }

    let roots = walk::collect(&ret.program);
    let mut splicer = Splicer {
        source,
        index: &index,
        counter,
        out: Instrumented::default(),
    };

    let mut code = String::with_capacity(source.len() + roots.len() * 128);
    let mut outline = String::with_capacity(source.len());
    let mut cursor = 0;
    for root in &roots {
        code.push_str(&source[cursor..root.start]);
        code.push_str(&splicer.function(root));
        outline.push_str(&source[cursor..root.body_start]);
        cursor = root.end;
        outline.push_str(&source[root.body_end..cursor]);
    }
    code.push_str(&source[cursor..]);
    outline.push_str(&source[cursor..]);

    let mut out = splicer.out;
    out.code = code;
    out.outline = outline;
    debug!("instrument"; "{} functions wrapped", out.ids.len());
    Ok(out)
}

struct Splicer<'s, 'c> {
    source: &'s str,
    index: &'s LineIndex<'s>,
    counter: &'c mut IdCounter,
    out: Instrumented,
}

impl Splicer<'_, '_> {
    /// Rewrite one function span, children first.
    fn function(&mut self, node: &FunctionNode) -> String {
        let body = self.body(node);
        let id = self.counter.next_id();
        self.out.ids.insert(id, self.index.range(node.start, node.end));

        let header = &self.source[node.start..node.body_start];
        let wrapper = FUNCTION_WRAPPER.render(&WrapperVars { id });

        let mut text = String::with_capacity(node.end - node.start + wrapper.len() + 2);
        text.push_str(header);
        if ends_with_bare_directive(header) {
            text.push(';');
        }
        text.push_str(&wrapper);
        text.push(' ');
        text.push_str(&body);
        text.push_str(&self.source[node.body_end..node.end]);

        self.out.bodies.insert(id, body);
        self.out.headers.insert(id, header.to_string());
        text
    }

    /// Original body statements with nested functions rewritten.
    fn body(&mut self, node: &FunctionNode) -> String {
        let mut text = String::with_capacity(node.body_end - node.body_start);
        let mut cursor = node.body_start;
        for child in &node.children {
            text.push_str(&self.source[cursor..child.start]);
            text.push_str(&self.function(child));
            cursor = child.end;
        }
        text.push_str(&self.source[cursor..node.body_end]);
        text
    }
}

/// A directive without its semicolon would run into the wrapper.
fn ends_with_bare_directive(header: &str) -> bool {
    header.trim_end().ends_with(['"', '\''])
}
