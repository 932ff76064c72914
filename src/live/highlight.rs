//! Selectors for highlighting what the cursor is on.

use crate::instrument::{LineIndex, Pos};

/// Selector of the CSS rule at `pos`.
///
/// Both the selector text and the declaration block count as inside the
/// rule. At-rule preludes and blocks (`@media`, `@font-face`) have no
/// selector.
pub fn selector_at(css: &str, pos: Pos) -> Option<String> {
    let offset = LineIndex::new(css).offset(pos)?;
    let rule = rules(css)
        .into_iter()
        .filter(|rule| rule.start <= offset && offset <= rule.close)
        .min_by_key(|rule| rule.close - rule.start)?;

    let prelude = normalize(&css[rule.start..rule.open]);
    if prelude.is_empty() || prelude.starts_with('@') {
        return None;
    }
    Some(prelude)
}

/// Selector matching every element whose `data-brackets-id` is in `ids`.
pub fn tag_selector(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| format!("[data-brackets-id='{id}']"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Remembers the last selector pushed so repeats are dropped.
#[derive(Debug, Default)]
pub struct HighlightState {
    last: Option<String>,
}

impl HighlightState {
    /// Record `selector`; `false` when it was the last one pushed.
    pub fn begin(&mut self, selector: &str) -> bool {
        if self.last.as_deref() == Some(selector) {
            return false;
        }
        self.last = Some(selector.to_string());
        true
    }

    pub fn forget(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

// ============================================================================
// Rule scanning
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Rule {
    /// First byte of the prelude, after leading whitespace and comments
    start: usize,
    /// The `{`
    open: usize,
    /// The matching `}`, or the end of the text when unclosed
    close: usize,
}

fn rules(css: &str) -> Vec<Rule> {
    let bytes = css.as_bytes();
    let mut rules = Vec::new();
    let mut open: Vec<(usize, usize)> = Vec::new();
    let mut segment = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'{' => {
                open.push((skip_trivia(css, segment, i), i));
                segment = i + 1;
            }
            b'}' => {
                if let Some((start, brace)) = open.pop() {
                    rules.push(Rule {
                        start,
                        open: brace,
                        close: i,
                    });
                }
                segment = i + 1;
            }
            b';' => segment = i + 1,
            _ => {}
        }
        i += 1;
    }

    rules.extend(open.into_iter().map(|(start, brace)| Rule {
        start,
        open: brace,
        close: css.len(),
    }));
    rules
}

/// First offset in `from..to` that is neither whitespace nor inside a comment.
fn skip_trivia(css: &str, mut from: usize, to: usize) -> usize {
    loop {
        let rest = &css[from..to];
        let trimmed = rest.trim_start();
        from += rest.len() - trimmed.len();
        if trimmed.starts_with("/*") {
            from = css[from + 2..to].find("*/").map_or(to, |end| from + 2 + end + 2);
        } else {
            return from;
        }
    }
}

fn normalize(prelude: &str) -> String {
    let mut text = String::with_capacity(prelude.len());
    let mut rest = prelude;
    while let Some(start) = rest.find("/*") {
        text.push_str(&rest[..start]);
        text.push(' ');
        rest = rest[start + 2..]
            .find("*/")
            .map_or("", |end| &rest[start + 2 + end + 2..]);
    }
    text.push_str(rest);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
