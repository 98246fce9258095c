use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;

use crate::models::Source;

pub const DEFAULT_IMAGE_CDN_TEMPLATE: &str =
    "https://imagescdn.tasva.com/img/app/product/1/{id}.jpg?w=1000&auto=format";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sources: HashMap<String, SourceConfig>,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub database_url: String,
    pub image_cdn_template: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    pub page_limit: u64,
    pub page_delay_ms: u64,
    /// Highest page number (page cursors) or offset (offset cursors) ever requested.
    pub safety_ceiling: u64,
    #[serde(default)]
    pub default_queries: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

impl SourceConfig {
    pub fn credential(&self, name: &str) -> Option<&str> {
        self.credentials
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn queries(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        let mut sources = HashMap::new();

        sources.insert(
            Source::Snitch.key().to_string(),
            SourceConfig {
                name: "Snitch".to_string(),
                base_url: "https://mxemjhp3rt.ap-south-1.awsapprunner.com".to_string(),
                page_limit: 1000,
                page_delay_ms: 0,
                safety_ceiling: 1000,
                default_queries: queries(&["sneakers", "t shirt", "jeans", "hoodie", "jacket"]),
                headers: headers(&[
                    ("Accept", "application/json, text/plain, */*"),
                    ("Accept-Language", "en-GB,en-US;q=0.9,en;q=0.8"),
                    ("Cache-Control", "no-cache"),
                    ("Origin", "https://www.snitch.com"),
                    ("Pragma", "no-cache"),
                    ("Referer", "https://www.snitch.com/"),
                ]),
                credentials: BTreeMap::new(),
            },
        );

        sources.insert(
            Source::Tasva.key().to_string(),
            SourceConfig {
                name: "Tasva".to_string(),
                base_url: "https://plpengineapis.abfrl.in/fetchProducts".to_string(),
                page_limit: 100,
                page_delay_ms: 500,
                safety_ceiling: 100_000,
                default_queries: queries(&["kurta", "sherwani", "bundi", "pajama"]),
                headers: headers(&[
                    ("Accept", "application/json, text/plain, */*"),
                    ("Accept-Language", "en-GB,en-US;q=0.9,en;q=0.8"),
                    ("Cache-Control", "no-cache"),
                    ("Origin", "https://www.tasva.com"),
                    ("Pragma", "no-cache"),
                    ("Referer", "https://www.tasva.com/"),
                    ("requestBrand", "TASVA"),
                ]),
                credentials: BTreeMap::new(),
            },
        );

        sources.insert(
            Source::Shopify.key().to_string(),
            SourceConfig {
                name: "Shopify".to_string(),
                base_url: String::new(),
                page_limit: 0,
                page_delay_ms: 0,
                safety_ceiling: 0,
                default_queries: Vec::new(),
                headers: headers(&[
                    ("Accept", "application/json, text/xml, */*"),
                    ("Accept-Language", "en-US,en;q=0.9"),
                ]),
                credentials: BTreeMap::new(),
            },
        );

        Config {
            sources,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36".to_string(),
            request_timeout_seconds: 30,
            database_url: "storescrape.db".to_string(),
            image_cdn_template: DEFAULT_IMAGE_CDN_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Layer built-in defaults, an optional TOML file and `STORESCRAPE__*`
    /// environment variables. `DATABASE_URL` overrides the store location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&Config::default())
            .context("Failed to build default configuration")?;

        let mut builder = ::config::Config::builder().add_source(defaults);
        builder = match path {
            Some(path) => builder.add_source(::config::File::from(path).required(true)),
            None => builder.add_source(::config::File::with_name("storescrape").required(false)),
        };
        builder = builder.add_source(
            ::config::Environment::with_prefix("STORESCRAPE")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        for key in config.sources.keys() {
            if Source::from_key(key).is_none() {
                warn!("Ignoring configuration for unknown source '{}'", key);
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database_url = url;
            }
        }

        Ok(config)
    }

    pub fn source(&self, source: Source) -> Result<&SourceConfig> {
        self.sources
            .get(source.key())
            .with_context(|| format!("No configuration for source '{}'", source))
    }

    /// Filesystem path of the SQLite store.
    pub fn database_path(&self) -> &str {
        self.database_url
            .strip_prefix("sqlite://")
            .unwrap_or(&self.database_url)
    }
}
