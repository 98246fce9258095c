use tracing::{error, info};

use crate::extract::{dedupe, field_key};
use crate::models::{Record, Source};
use crate::paginate::{collect_query, PageSource, PaginationSettings, StopReason};

mod shopify;
mod snitch;
mod tasva;

pub use shopify::{
    collection_name, is_product_sitemap, is_product_url, parse_sitemap_locs, product_json_url, ShopifyCrawl,
    ShopifyScraper, SitemapEntries,
};
pub use snitch::SnitchScraper;
pub use tasva::{is_invalid_request, project_tasva, TasvaScraper};

pub trait SearchScraper: PageSource {
    fn source(&self) -> Source;

    fn identity_field(&self) -> &'static str;

    fn identity_key(&self, record: &Record) -> Option<String> {
        field_key(self.identity_field())(record)
    }

    fn preferred_fields(&self) -> &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySummary {
    pub query: String,
    pub records: usize,
    pub pages: usize,
    pub skipped: usize,
    pub stop_reason: StopReason,
}

#[derive(Debug, Default)]
pub struct SearchRun {
    pub records: Vec<Record>,
    pub duplicates: usize,
    pub queries: Vec<QuerySummary>,
}

/// Run every query in turn, then dedupe across all of them.
pub async fn run_search<S>(scraper: &S, queries: &[String], settings: &PaginationSettings) -> SearchRun
where
    S: SearchScraper + ?Sized,
{
    info!("Starting {} scraper with {} queries: {}", scraper.source(), queries.len(), queries.join(", "));

    let mut collected = Vec::new();
    let mut summaries = Vec::with_capacity(queries.len());

    for (idx, query) in queries.iter().enumerate() {
        info!("Processing query {}/{}: '{}'", idx + 1, queries.len(), query);
        let outcome = collect_query(scraper, query, settings).await;

        match outcome.stop_reason {
            StopReason::FetchFailed => error!("Query '{}' ended on a failed fetch after {} records", query, outcome.records.len()),
            reason => info!("Query '{}' completed: {} records ({})", query, outcome.records.len(), reason),
        }

        summaries.push(QuerySummary {
            query: query.clone(),
            records: outcome.records.len(),
            pages: outcome.pages_fetched,
            skipped: outcome.skipped,
            stop_reason: outcome.stop_reason,
        });
        collected.extend(outcome.records);
        info!("Total records collected so far: {}", collected.len());
    }

    let before = collected.len();
    let (records, duplicates) = dedupe(collected, |r| scraper.identity_key(r));
    info!("Deduplicated {} records down to {}", before, records.len());

    SearchRun {
        records,
        duplicates,
        queries: summaries,
    }
}
