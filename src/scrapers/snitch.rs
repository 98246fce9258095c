use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::Config;
use crate::error::FetchError;
use crate::extract::{key_paths, KeyPath};
use crate::models::{MetaHints, Source};
use crate::paginate::{Cursor, PageSource};
use crate::scrapers::SearchScraper;
use crate::utils::http::{create_client, get_json};

const RECORD_PATHS: &[&str] = &["data", "products", "results", "items", "data.products", "data.results"];

const PREFERRED_FIELDS: &[&str] = &[
    "id", "title", "price", "original_price", "discount", "brand", "category", "url", "image",
    "description", "in_stock", "rating", "reviews", "sku", "color", "size", "material",
];

pub struct SnitchScraper {
    client: Client,
    base_url: String,
    record_hints: Vec<KeyPath>,
    meta_hints: MetaHints,
}

impl SnitchScraper {
    pub fn new(config: &Config) -> Result<Self> {
        let mut source = config.source(Source::Snitch)?.clone();
        if let Some(client_id) = source.credential("client_id").map(str::to_string) {
            source.headers.insert("client-id".to_string(), client_id);
        }
        let client = create_client(config, &source)?;
        Ok(Self::with_client(client, &source.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            record_hints: key_paths(RECORD_PATHS),
            meta_hints: MetaHints::new()
                .total("data.total_count")
                .total("total_count")
                .has_more("data.hasMore")
                .has_more("hasMore")
                .next_page("data.nextPage")
                .next_page("nextPage")
                .total_pages("data.totalPages")
                .total_pages("totalPages"),
        }
    }
}

#[async_trait]
impl PageSource for SnitchScraper {
    fn first_cursor(&self) -> Cursor {
        Cursor::Page(1)
    }

    fn record_hints(&self) -> &[KeyPath] {
        &self.record_hints
    }

    fn meta_hints(&self) -> &MetaHints {
        &self.meta_hints
    }

    async fn fetch_page(&self, query: &str, cursor: Cursor, limit: u64) -> Result<Value, FetchError> {
        let url = format!("{}/products/search", self.base_url);
        let page = cursor.page_number(limit).to_string();
        let limit = limit.to_string();
        let params = [("page", page.as_str()), ("limit", limit.as_str()), ("keyword", query)];
        get_json(&self.client, &url, &params).await
    }
}

impl SearchScraper for SnitchScraper {
    fn source(&self) -> Source {
        Source::Snitch
    }

    fn identity_field(&self) -> &'static str {
        "title"
    }

    fn preferred_fields(&self) -> &'static [&'static str] {
        PREFERRED_FIELDS
    }
}
