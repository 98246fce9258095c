pub mod dedup;
pub mod flatten;
pub mod normalizer;

pub use dedup::*;
pub use flatten::*;
pub use normalizer::*;

use serde_json::Value;
use std::fmt;

/// A dotted path into a JSON document, e.g. `results.products.hits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn parse(path: &str) -> Self {
        KeyPath(
            path.split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Follow the path through nested objects. An empty path resolves to the root.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(root, |node, segment| node.as_object()?.get(segment))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

pub fn key_paths(paths: &[&str]) -> Vec<KeyPath> {
    paths.iter().map(|p| KeyPath::parse(p)).collect()
}

/// Cut a response body down for diagnostics without splitting a UTF-8 char.
pub fn truncate_excerpt(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_path() {
        let doc = json!({"results": {"products": {"hits": [1, 2]}}});
        let path = KeyPath::parse("results.products.hits");
        assert_eq!(path.resolve(&doc), Some(&json!([1, 2])));
        assert_eq!(path.to_string(), "results.products.hits");
    }

    #[test]
    fn stops_at_non_objects() {
        let doc = json!({"data": [1, 2]});
        assert!(KeyPath::parse("data.products").resolve(&doc).is_none());
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_excerpt("héllo", 2), "hé...");
        assert_eq!(truncate_excerpt("short", 10), "short");
    }
}
