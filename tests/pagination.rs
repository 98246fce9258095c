use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use storescrape::error::FetchError;
use storescrape::extract::{key_paths, KeyPath};
use storescrape::models::MetaHints;
use storescrape::paginate::{collect_query, Cursor, PageSource, PaginationSettings, StopReason};

/// Serves `total` items in offset pages and reports the total.
struct Catalogue {
    total: u64,
    report_total: bool,
    always_more: bool,
    calls: AtomicUsize,
    hints: Vec<KeyPath>,
    meta: MetaHints,
}

impl Catalogue {
    fn new(total: u64) -> Self {
        Self {
            total,
            report_total: true,
            always_more: false,
            calls: AtomicUsize::new(0),
            hints: key_paths(&["data.items"]),
            meta: MetaHints::new().total("data.total").has_more("data.hasMore"),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for Catalogue {
    fn first_cursor(&self) -> Cursor {
        Cursor::Offset(0)
    }

    fn record_hints(&self) -> &[KeyPath] {
        &self.hints
    }

    fn meta_hints(&self) -> &MetaHints {
        &self.meta
    }

    async fn fetch_page(&self, _query: &str, cursor: Cursor, limit: u64) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = cursor.position();
        let end = if self.always_more { start + limit } else { (start + limit).min(self.total) };
        let items: Vec<Value> = (start..end).map(|i| json!({"id": i, "title": format!("item {}", i)})).collect();

        let mut data = json!({"items": items});
        if self.report_total {
            data["total"] = json!(self.total);
        }
        if self.always_more {
            data["hasMore"] = json!(true);
        }
        Ok(json!({"data": data}))
    }
}

fn settings(limit: u64, ceiling: u64) -> PaginationSettings {
    PaginationSettings {
        limit,
        delay: Duration::ZERO,
        safety_ceiling: ceiling,
    }
}

#[tokio::test]
async fn stops_after_ceil_total_over_limit_fetches() {
    let source = Catalogue::new(25);
    let outcome = collect_query(&source, "shirt", &settings(10, 100_000)).await;

    assert_eq!(source.calls(), 3);
    assert_eq!(outcome.records.len(), 25);
    assert_eq!(outcome.total, Some(25));
    assert_eq!(outcome.stop_reason, StopReason::ReachedTotal);
}

#[tokio::test]
async fn exact_multiple_needs_no_extra_fetch() {
    let source = Catalogue::new(20);
    let outcome = collect_query(&source, "shirt", &settings(10, 100_000)).await;

    assert_eq!(source.calls(), 2);
    assert_eq!(outcome.records.len(), 20);
}

#[tokio::test]
async fn without_total_a_short_page_ends_the_query() {
    let mut source = Catalogue::new(25);
    source.report_total = false;
    let outcome = collect_query(&source, "shirt", &settings(10, 100_000)).await;

    assert_eq!(source.calls(), 3);
    assert_eq!(outcome.records.len(), 25);
    assert_eq!(outcome.stop_reason, StopReason::ShortPage);
}

#[tokio::test]
async fn safety_ceiling_stops_an_endless_source() {
    let mut source = Catalogue::new(0);
    source.report_total = false;
    source.always_more = true;
    let outcome = collect_query(&source, "shirt", &settings(10, 30)).await;

    assert_eq!(outcome.stop_reason, StopReason::SafetyLimit);
    assert_eq!(source.calls(), 4);
    assert_eq!(outcome.records.len(), 40);
}
