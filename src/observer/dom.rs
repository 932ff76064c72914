//! What the observer needs from the hosting page engine.

/// A DOM node added to or removed from the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    /// Element name as reported by the engine (any case)
    pub name: String,
    pub src: Option<String>,
    pub rel: Option<String>,
    pub href: Option<String>,
}

impl Node {
    pub fn element(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// `<script src=...>`
    pub fn script(src: &str) -> Self {
        Self {
            name: "SCRIPT".into(),
            src: Some(src.to_string()),
            ..Self::default()
        }
    }

    /// `<link rel="stylesheet" href=...>`
    pub fn stylesheet_link(href: &str) -> Self {
        Self {
            name: "LINK".into(),
            rel: Some("stylesheet".into()),
            href: Some(href.to_string()),
            ..Self::default()
        }
    }

    /// Script element with a non-empty `src`.
    pub fn external_script(&self) -> Option<&str> {
        if !self.name.eq_ignore_ascii_case("script") {
            return None;
        }
        self.src.as_deref().filter(|src| !src.is_empty())
    }

    /// Stylesheet link with a non-empty `href`.
    pub fn external_stylesheet(&self) -> Option<&str> {
        if !self.name.eq_ignore_ascii_case("link") || self.rel.as_deref() != Some("stylesheet") {
            return None;
        }
        self.href.as_deref().filter(|href| !href.is_empty())
    }
}

/// A change notification delivered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// One mutation-observer record.
    Batch { added: Vec<Node>, removed: Vec<Node> },
    /// Legacy single-node insertion event.
    Inserted(Node),
    /// Legacy single-node removal event.
    Removed(Node),
}

/// One entry of the document's stylesheet list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleSheet {
    /// `None` for inline `<style>` sheets
    pub href: Option<String>,
    /// Sheets pulled in by `@import` rules. `None` when the rules can't be
    /// read (cross-origin).
    pub imports: Option<Vec<StyleSheet>>,
}

impl StyleSheet {
    pub fn external(href: &str, imports: Vec<StyleSheet>) -> Self {
        Self {
            href: Some(href.to_string()),
            imports: Some(imports),
        }
    }

    /// A sheet whose rules throw on access.
    pub fn cross_origin(href: &str) -> Self {
        Self {
            href: Some(href.to_string()),
            imports: None,
        }
    }

    pub fn inline() -> Self {
        Self {
            href: None,
            imports: Some(Vec::new()),
        }
    }
}

/// The live document as the observer sees it.
pub trait DomHost {
    /// `src` of every script element that has one, in document order.
    fn scripts(&self) -> Vec<String>;

    /// The document's stylesheet list, in document order.
    fn stylesheets(&self) -> Vec<StyleSheet>;

    /// Remove the element with `id`. Returns whether one was found.
    fn remove_element_by_id(&mut self, id: &str) -> bool;
}

/// Where the observer's messages go (the page side of the transport).
pub trait ObserverSink {
    fn send(&mut self, message: &str);
}

impl ObserverSink for Vec<String> {
    fn send(&mut self, message: &str) {
        self.push(message.to_string());
    }
}
