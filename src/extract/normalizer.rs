use serde_json::{Map, Value};
use tracing::debug;

use super::KeyPath;

/// Keys whose presence on an object suggests it describes a product.
pub const INDICATOR_KEYS: &[&str] = &[
    "title",
    "name",
    "price",
    "id",
    "product_id",
    "image",
    "url",
    "productUrl",
    "selling_price",
];

/// Extra indicators accepted by the deep walk.
const DEEP_INDICATOR_KEYS: &[&str] = &["product_name", "productName"];

/// Keys ignored by the recursive array search (page-rendering metadata).
const SKIP_KEYS: &[&str] = &[
    "children",
    "className",
    "routeParams",
    "__PAGE__",
    "needHamBurger",
    "needSearchBar",
    "needDesktopIcons",
    "displayAppNudge",
    "key",
    "value",
];

/// Objects carrying any of these are layout nodes, not products.
const MARKER_KEYS: &[&str] = &["children", "className"];

/// Keys the deep walk never descends into.
const DEEP_SKIP_KEYS: &[&str] = &["children", "className", "routeParams"];

const MAX_SEARCH_DEPTH: usize = 10;
const MAX_WALK_DEPTH: usize = 15;

/// Locate the list of record-like objects in an arbitrary payload.
///
/// Known paths are tried first, in order; the first one holding an array wins
/// even if that array is empty. Then a bounded search for an array of
/// product-looking objects, then a deep walk collecting every product-looking
/// object. Nothing found yields an empty vector.
pub fn locate_records(payload: &Value, hints: &[KeyPath]) -> Vec<Value> {
    for path in hints {
        if let Some(Value::Array(items)) = path.resolve(payload) {
            debug!("Found {} candidates at known path '{}'", items.len(), path);
            return items.clone();
        }
    }

    if let Some(items) = find_product_array(payload, 0) {
        debug!("Found {} candidates by recursive search", items.len());
        return items.clone();
    }

    let found = deep_walk(payload, 0);
    debug!("Deep walk found {} product-like objects", found.len());
    found
}

fn has_indicator(obj: &Map<String, Value>) -> bool {
    INDICATOR_KEYS.iter().any(|k| obj.contains_key(*k))
}

fn looks_like_product_array(items: &[Value]) -> bool {
    matches!(items.first(), Some(Value::Object(first)) if has_indicator(first))
}

fn find_product_array(node: &Value, depth: usize) -> Option<&Vec<Value>> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }

    match node {
        Value::Array(items) if looks_like_product_array(items) => Some(items),
        Value::Object(obj) => obj
            .iter()
            .filter(|(key, _)| !SKIP_KEYS.contains(&key.as_str()))
            .find_map(|(_, value)| match value {
                Value::Array(items) if looks_like_product_array(items) => Some(items),
                _ => find_product_array(value, depth + 1),
            }),
        _ => None,
    }
}

fn is_deep_candidate(obj: &Map<String, Value>) -> bool {
    let indicator = has_indicator(obj) || DEEP_INDICATOR_KEYS.iter().any(|k| obj.contains_key(*k));
    let marker = MARKER_KEYS.iter().any(|k| obj.contains_key(*k));
    indicator && !marker
}

fn deep_walk(node: &Value, depth: usize) -> Vec<Value> {
    if depth > MAX_WALK_DEPTH {
        return Vec::new();
    }

    match node {
        Value::Object(obj) => {
            let mut found = Vec::new();
            if is_deep_candidate(obj) {
                found.push(node.clone());
            }
            for (key, value) in obj {
                if DEEP_SKIP_KEYS.contains(&key.as_str()) {
                    continue;
                }
                found.extend(deep_walk(value, depth + 1));
            }
            found
        }
        Value::Array(items) => items
            .iter()
            .flat_map(|item| deep_walk(item, depth + 1))
            .collect(),
        _ => Vec::new(),
    }
}
