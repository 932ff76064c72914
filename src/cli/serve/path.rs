//! Request URL to served file resolution.

use std::path::{Path, PathBuf};

/// Resolve a request URL to a file under `root`.
///
/// Directories resolve to their `index.html`. Anything that escapes `root`
/// (`..`, symlinks) resolves to nothing.
pub fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let clean = url_path(url);
    let clean = clean.trim_matches('/');
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let canonical = root.join(clean).canonicalize().ok()?;
    let root = root.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Percent-decoded path of a request URL, without query or fragment.
pub fn url_path(url: &str) -> String {
    use percent_encoding::percent_decode_str;

    let path = url.split(['?', '#']).next().unwrap_or(url);
    percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<p>").unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/my style.css"), "p {}").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn test_resolve_file_and_index() {
        let dir = site();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(resolve_path("/", dir.path()), Some(root.join("index.html")));
        assert_eq!(
            resolve_path("/css/my%20style.css?v=2", dir.path()),
            Some(root.join("css/my style.css"))
        );
    }

    #[test]
    fn test_resolve_rejects_escapes_and_missing() {
        let dir = site();
        assert_eq!(resolve_path("/../etc/passwd", dir.path()), None);
        assert_eq!(resolve_path("/css/%2e%2e/%2e%2e/x", dir.path()), None);
        assert_eq!(resolve_path("/missing.js", dir.path()), None);
        assert_eq!(resolve_path("/empty/", dir.path()), None);
    }

    #[test]
    fn test_url_path() {
        assert_eq!(url_path("/a%20b.html?x=1#top"), "/a b.html");
    }
}
