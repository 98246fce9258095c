use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::extract::{flatten, locate_records, KeyPath};
use crate::models::{MetaHints, PageMeta, PageResult, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Page(u64),
    Offset(u64),
}

impl Cursor {
    pub fn position(&self) -> u64 {
        match self {
            Cursor::Page(n) | Cursor::Offset(n) => *n,
        }
    }

    pub fn advance(self, limit: u64) -> Self {
        match self {
            Cursor::Page(n) => Cursor::Page(n + 1),
            Cursor::Offset(n) => Cursor::Offset(n + limit),
        }
    }

    pub fn page_number(&self, limit: u64) -> u64 {
        match self {
            Cursor::Page(n) => *n,
            Cursor::Offset(n) if limit > 0 => n / limit + 1,
            Cursor::Offset(_) => 1,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Page(n) => write!(f, "page {}", n),
            Cursor::Offset(n) => write!(f, "offset {}", n),
        }
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    fn first_cursor(&self) -> Cursor;

    fn record_hints(&self) -> &[KeyPath];

    fn meta_hints(&self) -> &MetaHints;

    async fn fetch_page(&self, query: &str, cursor: Cursor, limit: u64) -> Result<Value, FetchError>;

    fn to_record(&self, candidate: &Value) -> Option<Record> {
        match candidate {
            Value::Object(_) => Some(flatten(candidate)),
            _ => None,
        }
    }

    fn parse_page(&self, payload: &Value) -> PageResult {
        PageResult {
            candidates: locate_records(payload, self.record_hints()),
            meta: PageMeta::from_payload(payload, self.meta_hints()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    pub limit: u64,
    pub delay: Duration,
    pub safety_ceiling: u64,
}

impl PaginationSettings {
    pub fn from_source(source: &SourceConfig) -> Self {
        Self {
            limit: source.page_limit,
            delay: Duration::from_millis(source.page_delay_ms),
            safety_ceiling: source.safety_ceiling,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EmptyPage,
    ReachedTotal,
    NoMorePages,
    ShortPage,
    SafetyLimit,
    FetchFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::EmptyPage => "empty page",
            StopReason::ReachedTotal => "reached total count",
            StopReason::NoMorePages => "source reported no more pages",
            StopReason::ShortPage => "short page without pagination info",
            StopReason::SafetyLimit => "safety limit reached",
            StopReason::FetchFailed => "fetch failed",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    Stop(StopReason),
}

/// Decide whether to fetch another page.
pub fn decide(page_len: usize, collected: u64, limit: u64, cursor: Cursor, meta: &PageMeta) -> Continuation {
    use Continuation::*;

    if page_len == 0 {
        return Stop(StopReason::EmptyPage);
    }

    if let Some(total) = meta.total {
        return if collected < total { Continue } else { Stop(StopReason::ReachedTotal) };
    }

    let explicit = meta
        .has_more
        .or(meta.next_page)
        .or_else(|| meta.total_pages.map(|pages| cursor.page_number(limit) < pages));
    if let Some(more) = explicit {
        return if more { Continue } else { Stop(StopReason::NoMorePages) };
    }

    if limit > 0 && page_len as u64 == limit {
        Continue
    } else {
        Stop(StopReason::ShortPage)
    }
}

#[derive(Debug)]
pub struct ExtractionState {
    pub records: Vec<Record>,
    pub cursor: Cursor,
    pub total: Option<u64>,
    pub pages_fetched: usize,
    pub skipped: usize,
}

impl ExtractionState {
    pub fn new(cursor: Cursor) -> Self {
        Self {
            records: Vec::new(),
            cursor,
            total: None,
            pages_fetched: 0,
            skipped: 0,
        }
    }

    pub fn collected(&self) -> u64 {
        (self.records.len() + self.skipped) as u64
    }

    fn finish(self, stop_reason: StopReason) -> QueryOutcome {
        QueryOutcome {
            records: self.records,
            pages_fetched: self.pages_fetched,
            skipped: self.skipped,
            total: self.total,
            stop_reason,
        }
    }
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub records: Vec<Record>,
    pub pages_fetched: usize,
    pub skipped: usize,
    pub total: Option<u64>,
    pub stop_reason: StopReason,
}

/// Fetch every page for one query.
pub async fn collect_query<S>(source: &S, query: &str, settings: &PaginationSettings) -> QueryOutcome
where
    S: PageSource + ?Sized,
{
    let mut state = ExtractionState::new(source.first_cursor());
    info!("Starting pagination for '{}' (limit {})", query, settings.limit);

    loop {
        match state.total {
            Some(total) => info!("Query '{}' | {} | progress {}/{}", query, state.cursor, state.collected(), total),
            None => info!("Query '{}' | {} | collected {}", query, state.cursor, state.collected()),
        }

        let payload = match source.fetch_page(query, state.cursor, settings.limit).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Fetch failed for '{}' at {}: {}", query, state.cursor, e);
                return state.finish(StopReason::FetchFailed);
            }
        };
        state.pages_fetched += 1;

        let page = source.parse_page(&payload);
        let page_len = page.candidates.len();
        for candidate in &page.candidates {
            match source.to_record(candidate) {
                Some(record) => state.records.push(record),
                None => {
                    state.skipped += 1;
                    debug!("Skipped a candidate that is not a record");
                }
            }
        }
        if page.meta.total.is_some() {
            state.total = page.meta.total;
        }
        info!("Collected {} records from {} ({} total for '{}')", page_len, state.cursor, state.records.len(), query);

        let decision = decide(page_len, state.collected(), settings.limit, state.cursor, &page.meta);
        if let Continuation::Stop(reason) = decision {
            info!("Pagination complete for '{}': {}", query, reason);
            return state.finish(reason);
        }

        let next = state.cursor.advance(settings.limit);
        if next.position() > settings.safety_ceiling {
            warn!("Safety limit reached for '{}': stopped before {}", query, next);
            return state.finish(StopReason::SafetyLimit);
        }
        state.cursor = next;

        if !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
    }
}
