use serde_json::Value;

use crate::extract::KeyPath;

/// Pagination metadata a source may report alongside a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    pub total: Option<u64>,
    pub total_pages: Option<u64>,
    pub has_more: Option<bool>,
    pub next_page: Option<bool>,
}

/// Key-paths probed for each piece of pagination metadata, first hit wins.
#[derive(Debug, Clone, Default)]
pub struct MetaHints {
    pub total: Vec<KeyPath>,
    pub total_pages: Vec<KeyPath>,
    pub has_more: Vec<KeyPath>,
    pub next_page: Vec<KeyPath>,
}

impl MetaHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(mut self, path: &str) -> Self {
        self.total.push(KeyPath::parse(path));
        self
    }

    pub fn total_pages(mut self, path: &str) -> Self {
        self.total_pages.push(KeyPath::parse(path));
        self
    }

    pub fn has_more(mut self, path: &str) -> Self {
        self.has_more.push(KeyPath::parse(path));
        self
    }

    pub fn next_page(mut self, path: &str) -> Self {
        self.next_page.push(KeyPath::parse(path));
        self
    }
}

impl PageMeta {
    pub fn from_payload(payload: &Value, hints: &MetaHints) -> Self {
        Self {
            total: first_match(payload, &hints.total, as_count),
            total_pages: first_match(payload, &hints.total_pages, as_count),
            has_more: first_match(payload, &hints.has_more, as_flag),
            next_page: first_match(payload, &hints.next_page, as_pointer),
        }
    }
}

fn first_match<T>(payload: &Value, paths: &[KeyPath], read: fn(&Value) -> Option<T>) -> Option<T> {
    paths
        .iter()
        .filter_map(|path| path.resolve(payload))
        .find_map(read)
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

// A truthy next-page pointer means more pages; a falsy one says nothing.
fn as_pointer(value: &Value) -> Option<bool> {
    let more = match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    };
    more.then_some(true)
}

/// One fetched page: raw record candidates plus whatever metadata was found.
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    pub candidates: Vec<Value>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_total_and_flags() {
        let payload = json!({
            "data": {"total_count": "40", "hasMore": true},
            "nextPage": null
        });
        let hints = MetaHints::new()
            .total("data.total_count")
            .has_more("data.hasMore")
            .next_page("nextPage");

        let meta = PageMeta::from_payload(&payload, &hints);
        assert_eq!(meta.total, Some(40));
        assert_eq!(meta.has_more, Some(true));
        assert_eq!(meta.next_page, None);
        assert_eq!(meta.total_pages, None);
    }

    #[test]
    fn falsy_next_page_is_absent() {
        let hints = MetaHints::new().next_page("nextPage");
        for pointer in [json!(null), json!(false), json!(""), json!(0)] {
            let meta = PageMeta::from_payload(&json!({"nextPage": pointer}), &hints);
            assert_eq!(meta.next_page, None, "{}", pointer);
        }
        let meta = PageMeta::from_payload(&json!({"nextPage": "/search?page=3"}), &hints);
        assert_eq!(meta.next_page, Some(true));
    }

    #[test]
    fn later_hint_used_when_first_missing() {
        let payload = json!({"results": {"products": {"total": 7}}});
        let hints = MetaHints::new()
            .total("data.total_count")
            .total("results.products.total");
        assert_eq!(PageMeta::from_payload(&payload, &hints).total, Some(7));
    }
}
