use anyhow::{anyhow, bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::FetchError;
use crate::models::Source;
use crate::utils::http::{create_client, decode_json, fetch_text};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapEntries {
    pub sitemaps: Vec<String>,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Sitemap,
    Url,
}

/// Read every `<loc>` in a sitemap or sitemap index. Namespaces are ignored.
pub fn parse_sitemap_locs(xml: &str) -> Result<SitemapEntries> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = SitemapEntries::default();
    let mut entry: Option<Entry> = None;
    let mut in_loc = false;
    let mut loc = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemap" => entry = Some(Entry::Sitemap),
                b"url" => entry = Some(Entry::Url),
                b"loc" => {
                    in_loc = true;
                    loc.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_loc => {
                let text = e.unescape().map_err(|err| anyhow!("XML parse error: {}", err))?;
                loc.push_str(&text);
            }
            Ok(Event::CData(e)) if in_loc => {
                loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"loc" => {
                    in_loc = false;
                    let value = loc.trim().to_string();
                    match entry {
                        Some(Entry::Sitemap) if !value.is_empty() => entries.sitemaps.push(value),
                        Some(Entry::Url) if !value.is_empty() => entries.urls.push(value),
                        _ => {}
                    }
                }
                b"sitemap" | b"url" => entry = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!("XML parse error at position {}: {}", reader.buffer_position(), e),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

pub fn is_product_sitemap(url: &str) -> bool {
    url.contains("sitemap_products")
}

pub fn is_product_url(url: &str) -> bool {
    url.contains("/products/")
}

pub fn product_json_url(product_url: &str) -> String {
    format!("{}.js", product_url.trim_end_matches('/'))
}

pub fn collection_name(sitemap_url: &str) -> Result<String> {
    let parsed = Url::parse(sitemap_url).with_context(|| format!("Invalid URL: {}", sitemap_url))?;
    let host = parsed
        .host_str()
        .with_context(|| format!("URL has no host: {}", sitemap_url))?;
    Ok(host.strip_prefix("www.").unwrap_or(host).to_string())
}

#[derive(Debug, Default)]
pub struct ShopifyCrawl {
    pub collection: String,
    pub product_urls: usize,
    pub products: Vec<Value>,
    pub errors: usize,
}

pub struct ShopifyScraper {
    client: Client,
    delay: Duration,
}

impl ShopifyScraper {
    pub fn new(config: &Config) -> Result<Self> {
        let source = config.source(Source::Shopify)?;
        let client = create_client(config, source)?;
        Ok(Self {
            client,
            delay: Duration::from_millis(source.page_delay_ms),
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            delay: Duration::ZERO,
        }
    }

    pub async fn product_sitemaps(&self, index_url: &str) -> Result<Vec<String>> {
        info!("Fetching sitemap index: {}", index_url);
        let xml = fetch_text(&self.client, index_url)
            .await
            .with_context(|| format!("Error fetching sitemap index {}", index_url))?;
        let entries = parse_sitemap_locs(&xml).context("Error parsing sitemap index")?;

        let sitemaps: Vec<String> = entries
            .sitemaps
            .into_iter()
            .filter(|loc| is_product_sitemap(loc))
            .collect();
        for sitemap in &sitemaps {
            info!("Found product sitemap: {}", sitemap);
        }
        info!("Found {} product sitemap(s)", sitemaps.len());
        Ok(sitemaps)
    }

    pub async fn product_urls(&self, sitemap_url: &str) -> Vec<String> {
        info!("Parsing product sitemap: {}", sitemap_url);
        let xml = match fetch_text(&self.client, sitemap_url).await {
            Ok(xml) => xml,
            Err(e) => {
                error!("Error fetching product sitemap {}: {}", sitemap_url, e);
                return Vec::new();
            }
        };

        match parse_sitemap_locs(&xml) {
            Ok(entries) => {
                let urls: Vec<String> = entries.urls.into_iter().filter(|u| is_product_url(u)).collect();
                info!("Found {} product URL(s)", urls.len());
                urls
            }
            Err(e) => {
                error!("Error parsing product sitemap {}: {}", sitemap_url, e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_product(&self, product_url: &str) -> Result<Value, FetchError> {
        let json_url = product_json_url(product_url);
        let body = fetch_text(&self.client, &json_url).await?;
        decode_json(&body)
    }

    pub async fn crawl(&self, index_url: &str) -> Result<ShopifyCrawl> {
        let collection = collection_name(index_url)?;
        info!("Crawling {} into collection '{}'", index_url, collection);

        let mut crawl = ShopifyCrawl {
            collection,
            ..Default::default()
        };

        let sitemaps = self.product_sitemaps(index_url).await?;
        if sitemaps.is_empty() {
            warn!("No product sitemaps found");
            return Ok(crawl);
        }

        let mut urls = Vec::new();
        for sitemap in &sitemaps {
            urls.extend(self.product_urls(sitemap).await);
        }
        crawl.product_urls = urls.len();
        info!("Total product URLs found: {}", urls.len());
        if urls.is_empty() {
            warn!("No product URLs found");
            return Ok(crawl);
        }

        for (idx, url) in urls.iter().enumerate() {
            info!("[{}/{}] Fetching: {}", idx + 1, urls.len(), url);
            match self.fetch_product(url).await {
                Ok(product @ Value::Object(_)) => crawl.products.push(product),
                Ok(_) => {
                    warn!("Product JSON from {} is not an object", url);
                    crawl.errors += 1;
                }
                Err(e) => {
                    error!("Error fetching product JSON for {}: {}", url, e);
                    crawl.errors += 1;
                }
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!("Successfully fetched {}/{} products", crawl.products.len(), urls.len());
        Ok(crawl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn index_and_urlset_locs_are_split() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap><loc>https://shop.in/sitemap_products_1.xml?from=1&amp;to=9</loc></sitemap>
          <sitemap><loc> https://shop.in/sitemap_pages_1.xml </loc></sitemap>
        </sitemapindex>"#;

        let entries = parse_sitemap_locs(xml).unwrap();
        assert_eq!(
            entries.sitemaps,
            vec![
                "https://shop.in/sitemap_products_1.xml?from=1&to=9".to_string(),
                "https://shop.in/sitemap_pages_1.xml".to_string(),
            ]
        );
        assert!(entries.urls.is_empty());
    }

    #[test]
    fn image_locs_inside_urls_do_not_leak() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                     xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
          <url>
            <loc>https://shop.in/products/tee</loc>
            <image:image><image:loc>https://cdn.shop.in/tee.jpg</image:loc></image:image>
          </url>
          <url><loc><![CDATA[https://shop.in/collections/all]]></loc></url>
        </urlset>"#;

        let entries = parse_sitemap_locs(xml).unwrap();
        // image:loc shares the local name, so it is read too; filtering drops it.
        let products: Vec<&String> = entries.urls.iter().filter(|u| is_product_url(u)).collect();
        assert_eq!(products, vec!["https://shop.in/products/tee"]);
        assert!(entries.urls.contains(&"https://shop.in/collections/all".to_string()));
    }

    #[test]
    fn broken_xml_is_an_error() {
        assert!(parse_sitemap_locs("<urlset><url><loc>x</url>").is_err());
    }

    #[test]
    fn url_helpers() {
        assert_eq!(product_json_url("https://shop.in/products/tee/"), "https://shop.in/products/tee.js");
        assert_eq!(collection_name("https://www.bananaclub.co.in/sitemap.xml").unwrap(), "bananaclub.co.in");
        assert!(collection_name("not a url").is_err());
        assert!(is_product_sitemap("https://x/sitemap_products_1.xml"));
        assert!(!is_product_url("https://x/pages/about"));
    }
}
