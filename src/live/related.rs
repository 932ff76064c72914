//! Scripts and stylesheets an HTML page reports it depends on.

use serde_json::Value;

use crate::debug;
use crate::observer::DocumentRelationSnapshot;
use crate::protocol::RemoteEvent;

/// Related documents of one page, kept current from observer events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedDocuments {
    snapshot: DocumentRelationSnapshot,
}

impl RelatedDocuments {
    /// Apply a page event. Returns `false` for events that are not about
    /// related documents or are malformed.
    pub fn apply(&mut self, event: &RemoteEvent) -> bool {
        match event.method.as_str() {
            "DocumentRelated" => {
                let related = event.message.get("related").cloned().unwrap_or(Value::Null);
                match serde_json::from_value(related) {
                    Ok(snapshot) => {
                        self.snapshot = snapshot;
                        true
                    }
                    Err(err) => {
                        debug!("live"; "ignoring malformed DocumentRelated: {}", err);
                        false
                    }
                }
            }
            "ScriptAdded" => event
                .str_field("src")
                .map(|src| self.snapshot.scripts.insert(src.to_string()))
                .is_some(),
            "ScriptRemoved" => event
                .str_field("src")
                .map(|src| self.snapshot.scripts.remove(src))
                .is_some(),
            "StylesheetAdded" => {
                let Some(href) = event.str_field("href") else {
                    return false;
                };
                let roots = event
                    .message
                    .get("roots")
                    .and_then(Value::as_array)
                    .map(|roots| {
                        roots
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                self.snapshot.stylesheets.insert(href.to_string(), roots);
                true
            }
            "StylesheetRemoved" => event
                .str_field("href")
                .map(|href| self.snapshot.stylesheets.remove(href))
                .is_some(),
            _ => false,
        }
    }

    /// Whether the page loads `url` as a script or stylesheet.
    pub fn is_related(&self, url: &str) -> bool {
        self.snapshot.scripts.contains(url) || self.snapshot.stylesheets.contains_key(url)
    }

    pub fn snapshot(&self) -> &DocumentRelationSnapshot {
        &self.snapshot
    }

    pub fn clear(&mut self) {
        self.snapshot = DocumentRelationSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ClientId;
    use serde_json::json;

    fn event(message: Value) -> RemoteEvent {
        RemoteEvent {
            client_id: ClientId(1),
            method: message["method"].as_str().unwrap().to_string(),
            message,
        }
    }

    #[test]
    fn test_document_related_replaces_snapshot() {
        let mut related = RelatedDocuments::default();
        related.apply(&event(json!({"method": "ScriptAdded", "src": "old.js"})));

        assert!(related.apply(&event(json!({
            "method": "DocumentRelated",
            "related": {
                "scripts": {"app.js": true},
                "stylesheets": {"main.css": ["main.css"], "reset.css": ["main.css"]}
            }
        }))));

        assert!(!related.is_related("old.js"));
        assert!(related.is_related("app.js"));
        assert!(related.is_related("reset.css"));
        assert_eq!(related.snapshot().stylesheets["reset.css"], vec!["main.css"]);
    }

    #[test]
    fn test_incremental_events() {
        let mut related = RelatedDocuments::default();
        related.apply(&event(json!({"method": "ScriptAdded", "src": "a.js"})));
        related.apply(&event(
            json!({"method": "StylesheetAdded", "href": "b.css", "roots": ["b.css"]}),
        ));
        assert!(related.is_related("a.js"));
        assert!(related.is_related("b.css"));

        related.apply(&event(json!({"method": "ScriptRemoved", "src": "a.js"})));
        related.apply(&event(
            json!({"method": "StylesheetRemoved", "href": "b.css", "roots": ["b.css"]}),
        ));
        assert!(!related.is_related("a.js"));
        assert!(!related.is_related("b.css"));
    }

    #[test]
    fn test_unrelated_and_malformed_events_ignored() {
        let mut related = RelatedDocuments::default();
        assert!(!related.apply(&event(json!({"method": "Ping"}))));
        assert!(!related.apply(&event(json!({"method": "ScriptAdded"}))));
        assert!(!related.apply(&event(json!({"method": "DocumentRelated", "related": 3}))));
        assert_eq!(related, RelatedDocuments::default());
    }
}
