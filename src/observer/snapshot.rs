//! Document relation snapshot and diffing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::dom::{DomHost, StyleSheet};

/// External scripts and stylesheets a page references.
///
/// Serialized the way pages report it:
/// `{"scripts": {"<src>": true}, "stylesheets": {"<href>": ["<root>", ...]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentRelationSnapshot {
    #[serde(with = "set_as_object", default)]
    pub scripts: BTreeSet<String>,
    /// Stylesheet href to the top-level sheets that (transitively) import it
    #[serde(default)]
    pub stylesheets: BTreeMap<String, Vec<String>>,
}

impl DocumentRelationSnapshot {
    /// Compute the full snapshot of `host`.
    pub fn compute(host: &impl DomHost) -> Self {
        Self {
            scripts: host.scripts().into_iter().filter(|s| !s.is_empty()).collect(),
            stylesheets: stylesheet_roots(&host.stylesheets()),
        }
    }
}

/// Every readable external stylesheet, including `@import`ed ones, with the
/// top-level sheet(s) it is reached from.
pub fn stylesheet_roots(sheets: &[StyleSheet]) -> BTreeMap<String, Vec<String>> {
    let mut roots = BTreeMap::new();
    for sheet in sheets {
        if let Some(base) = &sheet.href {
            collect(sheet, base, &mut roots);
        }
    }
    roots
}

fn collect(sheet: &StyleSheet, base: &str, roots: &mut BTreeMap<String, Vec<String>>) {
    // unreadable rules (cross-origin) are skipped, not fatal
    let (Some(href), Some(imports)) = (&sheet.href, &sheet.imports) else {
        return;
    };
    roots.entry(href.clone()).or_default().push(base.to_string());
    for import in imports {
        collect(import, base, roots);
    }
}

/// One stylesheet that appeared or disappeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetChange {
    pub href: String,
    pub roots: Vec<String>,
}

/// Hrefs added and removed between two stylesheet maps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotDelta {
    /// New hrefs, with their roots in the new map
    pub added: Vec<StylesheetChange>,
    /// Gone hrefs, with their roots in the old map
    pub removed: Vec<StylesheetChange>,
}

impl SnapshotDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff(
    old: &BTreeMap<String, Vec<String>>,
    new: &BTreeMap<String, Vec<String>>,
) -> SnapshotDelta {
    SnapshotDelta {
        added: missing_from(new, old),
        removed: missing_from(old, new),
    }
}

/// Entries of `from` whose href `other` lacks.
fn missing_from(
    from: &BTreeMap<String, Vec<String>>,
    other: &BTreeMap<String, Vec<String>>,
) -> Vec<StylesheetChange> {
    from.iter()
        .filter(|(href, _)| !other.contains_key(*href))
        .map(|(href, roots)| StylesheetChange {
            href: href.clone(),
            roots: roots.clone(),
        })
        .collect()
}

mod set_as_object {
    use std::collections::BTreeSet;

    use serde::de::{Deserializer, MapAccess, Visitor};
    use serde::ser::{SerializeMap, Serializer};

    pub fn serialize<S: Serializer>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(set.len()))?;
        for key in set {
            map.serialize_entry(key, &true)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<String>, D::Error> {
        struct KeysVisitor;

        impl<'de> Visitor<'de> for KeysVisitor {
            type Value = BTreeSet<String>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("an object keyed by URL")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut keys = BTreeSet::new();
                while let Some((key, _)) = access.next_entry::<String, serde::de::IgnoredAny>()? {
                    keys.insert(key);
                }
                Ok(keys)
            }
        }

        deserializer.deserialize_map(KeysVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(href, roots)| (href.to_string(), roots.iter().map(|r| r.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_diff_emits_minimal_deltas() {
        let old = map(&[("a", &["a"]), ("b", &["b"])]);
        let new = map(&[("b", &["b"]), ("c", &["c"])]);

        let delta = diff(&old, &new);
        assert_eq!(
            delta.added,
            vec![StylesheetChange {
                href: "c".into(),
                roots: vec!["c".into()]
            }]
        );
        assert_eq!(
            delta.removed,
            vec![StylesheetChange {
                href: "a".into(),
                roots: vec!["a".into()]
            }]
        );
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let same = map(&[("a", &["a"])]);
        assert!(diff(&same, &same).is_empty());
    }

    #[test]
    fn test_imports_carry_their_root() {
        let sheets = vec![
            StyleSheet::external(
                "http://x/main.css",
                vec![StyleSheet::external(
                    "http://x/base.css",
                    vec![StyleSheet::external("http://x/reset.css", vec![])],
                )],
            ),
            StyleSheet::inline(),
        ];
        let roots = stylesheet_roots(&sheets);
        assert_eq!(roots.len(), 3);
        assert_eq!(roots["http://x/reset.css"], vec!["http://x/main.css"]);
        assert_eq!(roots["http://x/main.css"], vec!["http://x/main.css"]);
    }

    #[test]
    fn test_shared_import_lists_every_root() {
        let shared = StyleSheet::external("http://x/shared.css", vec![]);
        let sheets = vec![
            StyleSheet::external("http://x/a.css", vec![shared.clone()]),
            StyleSheet::external("http://x/b.css", vec![shared]),
        ];
        let roots = stylesheet_roots(&sheets);
        assert_eq!(roots["http://x/shared.css"], vec!["http://x/a.css", "http://x/b.css"]);
    }

    #[test]
    fn test_cross_origin_sheets_skipped() {
        let sheets = vec![
            StyleSheet::cross_origin("http://cdn/font.css"),
            StyleSheet::external("http://x/a.css", vec![]),
        ];
        let roots = stylesheet_roots(&sheets);
        assert_eq!(roots.keys().collect::<Vec<_>>(), vec!["http://x/a.css"]);
    }

    #[test]
    fn test_wire_shape() {
        let snapshot = DocumentRelationSnapshot {
            scripts: ["http://x/a.js".to_string()].into_iter().collect(),
            stylesheets: map(&[("http://x/a.css", &["http://x/a.css"])]),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["scripts"]["http://x/a.js"], true);
        assert_eq!(json["stylesheets"]["http://x/a.css"][0], "http://x/a.css");

        let back: DocumentRelationSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
