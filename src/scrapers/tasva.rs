use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::extract::{flatten, flatten_value, key_paths, locate_records, to_compact_json, truncate_excerpt, KeyPath};
use crate::images::{url_columns, URL_COLUMNS};
use crate::models::{FieldValue, MetaHints, PageMeta, PageResult, Record, Source};
use crate::paginate::{Cursor, PageSource};
use crate::scrapers::SearchScraper;
use crate::signing::{Md5PayloadSigner, RequestSigner, Unsigned};
use crate::utils::http::{create_client, read_json};

const INVALID_REQUEST: &str = "INVALID_REQUEST";

const PREFERRED_FIELDS: &[&str] = &[
    "ProductID", "StyleCode", "Name", "ShortDescription", "LinkRewrite", "Price", "SellingPrice",
    "Color", "Quantity", "ProductURL", "Brand", "Fabric", "Fit", "Category", "DefaultCategoryName",
    "Gender", "ShopID", "Images", "Sizes", "Discount_Amount", "PublishedDate", "Active", "IsReturnable",
];

const FEATURE_COLUMNS: &[(&str, &str)] = &[
    ("Brand", "Brand"),
    ("Fabric", "Fabric"),
    ("Fit", "Fit"),
    ("Color", "Color_Feature"),
    ("Craft", "Craft"),
    ("Collection", "Collection"),
    ("Occasion", "Occasion"),
    ("Length", "Length"),
    ("Neck", "Neck"),
    ("SleeveLength", "SleeveLength"),
    ("Type", "Type"),
    ("Pockets", "Pockets"),
    ("Reversible", "Reversible"),
    ("Closure", "Closure"),
    ("Subbrand", "Subbrand"),
];

const DISCOUNT_COLUMNS: &[&str] = &["Type", "Amount", "StartDate", "EndDate"];

pub struct TasvaScraper {
    client: Client,
    endpoint: String,
    device_id: String,
    device_token: String,
    signer: Box<dyn RequestSigner>,
    image_template: String,
    record_hints: Vec<KeyPath>,
    meta_hints: MetaHints,
}

impl TasvaScraper {
    pub fn new(config: &Config) -> Result<Self> {
        let mut source = config.source(Source::Tasva)?.clone();
        if let Some(token) = source.credential("auth_token").map(str::to_string) {
            source.headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        if let Some(key) = source.credential("secure_key").map(str::to_string) {
            source.headers.insert("securekey".to_string(), key);
        }

        let signer: Box<dyn RequestSigner> = match source.credential("secure_key") {
            Some(secret) => Box::new(Md5PayloadSigner::new(secret)),
            None => {
                warn!("No Tasva secure_key configured, sending unsigned requests");
                Box::new(Unsigned)
            }
        };

        let client = create_client(config, &source)?;
        let mut scraper = Self::with_client(client, &source.base_url, signer, &config.image_cdn_template);
        scraper.device_id = source.credential("device_id").unwrap_or_default().to_string();
        scraper.device_token = source.credential("device_token").unwrap_or_default().to_string();
        Ok(scraper)
    }

    pub fn with_client(client: Client, endpoint: &str, signer: Box<dyn RequestSigner>, image_template: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            device_id: String::new(),
            device_token: String::new(),
            signer,
            image_template: image_template.to_string(),
            record_hints: key_paths(&["results.products.hits"]),
            meta_hints: MetaHints::new().total("results.products.total"),
        }
    }

    pub fn build_body(&self, query: &str, offset: u64, limit: u64) -> Map<String, Value> {
        let page_no = if limit > 0 { offset / limit + 1 } else { 1 };
        let body = json!({
            "categoryId": "-1",
            "categoryName": "",
            "fp": "",
            "sorting": "popular:asc",
            "limit": limit,
            "offset": offset,
            "pageNo": page_no,
            "pageName": "",
            "searchWord": query,
            "requestMode": "similarproducts",
            "storeId": 0,
            "customerId": 0,
            "cartId": 0,
            "shopId": 33,
            "shopName": "Tasva",
            "regionID": "UL",
            "deviceId": self.device_id,
            "isS2SCall": false,
            "deviceType": "desktop",
            "brand": "Tasva",
            "geoLocation": -1,
            "fcmToken": -1,
            "deviceToken": self.device_token,
        });
        match body {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    async fn post(&self, body: &Map<String, Value>) -> Result<Response, FetchError> {
        Ok(self.client.post(&self.endpoint).json(body).send().await?)
    }
}

fn bad_request(body: &str) -> FetchError {
    let body_excerpt = truncate_excerpt(body, 500);
    warn!("HTTP error 400: {}", body_excerpt);
    FetchError::Status {
        status: 400,
        body_excerpt,
    }
}

pub fn is_invalid_request(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("msg").cloned())
        .map(|msg| msg == json!([INVALID_REQUEST]))
        .unwrap_or(false)
}

#[async_trait]
impl PageSource for TasvaScraper {
    fn first_cursor(&self) -> Cursor {
        Cursor::Offset(0)
    }

    fn record_hints(&self) -> &[KeyPath] {
        &self.record_hints
    }

    fn meta_hints(&self) -> &MetaHints {
        &self.meta_hints
    }

    async fn fetch_page(&self, query: &str, cursor: Cursor, limit: u64) -> Result<Value, FetchError> {
        let mut body = self.build_body(query, cursor.position(), limit);
        self.signer.sign(&mut body);
        info!("POST {} | search '{}' | offset {} | limit {}", self.endpoint, query, cursor.position(), limit);

        let response = self.post(&body).await?;
        if response.status() != StatusCode::BAD_REQUEST {
            return read_json(response).await;
        }

        let text = response.text().await?;
        if !is_invalid_request(&text) {
            return Err(bad_request(&text));
        }

        warn!("Request rejected as {}, retrying without hash validation", INVALID_REQUEST);
        self.signer.relax(&mut body);
        let retry = self.post(&body).await?;
        if retry.status() != StatusCode::BAD_REQUEST {
            return read_json(retry).await;
        }

        let text = retry.text().await?;
        if is_invalid_request(&text) {
            Err(FetchError::Rejected {
                reason: format!("{} after relaxed retry", INVALID_REQUEST),
            })
        } else {
            Err(bad_request(&text))
        }
    }

    fn parse_page(&self, payload: &Value) -> PageResult {
        if payload.get("success").and_then(Value::as_bool) != Some(true) {
            warn!("Response without success flag, treating it as an empty page");
            return PageResult::default();
        }
        PageResult {
            candidates: locate_records(payload, &self.record_hints),
            meta: PageMeta::from_payload(payload, &self.meta_hints),
        }
    }

    fn to_record(&self, candidate: &Value) -> Option<Record> {
        let item = candidate.get("_source").unwrap_or(candidate);
        match item {
            Value::Object(_) => Some(project_tasva(item, &self.image_template)),
            _ => None,
        }
    }
}

impl SearchScraper for TasvaScraper {
    fn source(&self) -> Source {
        Source::Tasva
    }

    fn identity_field(&self) -> &'static str {
        "ProductID"
    }

    fn preferred_fields(&self) -> &'static [&'static str] {
        PREFERRED_FIELDS
    }
}

/// Flatten a product and add the promoted Tasva columns next to the generic ones.
pub fn project_tasva(item: &Value, image_template: &str) -> Record {
    let mut record = flatten(item);

    if let Some(Value::Object(features)) = item.get("Features") {
        for (key, column) in FEATURE_COLUMNS {
            if !record.contains(column) {
                record.insert(*column, features.get(*key).map(flatten_value).unwrap_or_else(|| "".into()));
            }
        }
    }

    if let Some(Value::Object(discount)) = item.get("Discount") {
        for key in DISCOUNT_COLUMNS {
            let value = discount.get(*key).map(flatten_value).unwrap_or_else(|| "".into());
            record.insert(format!("Discount_{}", key), value);
        }
    }

    let media = item.get("Media").and_then(Value::as_object);
    let images = media.and_then(|m| m.get("Images")).and_then(Value::as_array);
    let names: Vec<String> = images
        .map(|images| {
            images
                .iter()
                .filter_map(|img| img.get("Name").and_then(Value::as_str))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if let Some(images) = images {
        record.insert("Images", names.join(", "));
        record.insert("Images_JSON", to_compact_json(&Value::Array(images.clone())));
    }

    let swatch = media
        .and_then(|m| m.get("Swatch"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if let Some(media) = media {
        record.insert("Swatch", swatch);
        record.insert(
            "SwatchExtension",
            media.get("SwatchExtension").map(flatten_value).unwrap_or_else(|| "".into()),
        );
    }
    for (column, value) in URL_COLUMNS.iter().zip(url_columns(image_template, &names, swatch)) {
        record.insert(*column, value);
    }

    if let Some(Value::Array(sizes)) = item.get("Sizes") {
        let size_names: Vec<&str> = sizes
            .iter()
            .filter_map(|s| s.get("Name").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .collect();
        record.insert("Sizes_JSON", to_compact_json(&Value::Array(sizes.clone())));
        record.insert("Sizes", size_names.join(", "));
    }

    let product_url = match (record.text("LinkRewrite"), record.get("ProductID")) {
        (Some(slug), Some(id)) => format!("https://www.tasva.com/p/{}-{}.html", slug, id.to_cell()),
        _ => String::new(),
    };
    record.insert("ProductURL", FieldValue::Text(product_url));

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_IMAGE_CDN_TEMPLATE;
    use pretty_assertions::assert_eq;

    fn scraper() -> TasvaScraper {
        TasvaScraper::with_client(Client::new(), "http://localhost/fetchProducts", Box::new(Unsigned), DEFAULT_IMAGE_CDN_TEMPLATE)
    }

    fn hit() -> Value {
        json!({
            "_index": "products",
            "_source": {
                "ProductID": 1078050,
                "Name": "Silk Kurta",
                "LinkRewrite": "silk-kurta",
                "Features": {"Brand": "Tasva", "Color": "Ivory", "Fabric": "Silk"},
                "Discount": {"Type": "percent", "Amount": 20},
                "Media": {"Images": [{"Name": "1078050-16668879"}, {"Name": "1078050-16668881"}], "Swatch": "sw-1.jpg"},
                "Sizes": [{"Name": "M", "Quantity": 2}, {"Name": "L", "Quantity": 0}]
            }
        })
    }

    #[test]
    fn body_carries_paging_and_search_word() {
        let body = scraper().build_body("kurta", 200, 100);
        assert_eq!(body["searchWord"], json!("kurta"));
        assert_eq!(body["offset"], json!(200));
        assert_eq!(body["pageNo"], json!(3));
        assert_eq!(body["shopId"], json!(33));
        assert!(!body.contains_key("hash"));
    }

    #[test]
    fn source_hits_are_projected() {
        let record = scraper().to_record(&hit()).unwrap();

        assert_eq!(record.text("Brand").as_deref(), Some("Tasva"));
        assert_eq!(record.text("Color_Feature").as_deref(), Some("Ivory"));
        assert_eq!(record.get("Fit").map(|v| v.to_cell()).as_deref(), Some(""));
        assert_eq!(record.text("Discount_Type").as_deref(), Some("percent"));
        assert_eq!(record.get("Discount_Amount").map(|v| v.to_cell()).as_deref(), Some("20"));
        assert_eq!(record.text("Images").as_deref(), Some("1078050-16668879, 1078050-16668881"));
        assert_eq!(
            record.text("PrimaryImageURL").as_deref(),
            Some("https://imagescdn.tasva.com/img/app/product/1/1078050-16668879.jpg?w=1000&auto=format")
        );
        assert_eq!(
            record.text("SwatchImageURL").as_deref(),
            Some("https://imagescdn.tasva.com/img/app/product/1/sw-1.jpg?w=1000&auto=format")
        );
        assert_eq!(record.text("Sizes").as_deref(), Some("M, L"));
        assert!(record.text("Sizes_JSON").unwrap().contains("\"Quantity\":2"));
        assert_eq!(record.text("ProductURL").as_deref(), Some("https://www.tasva.com/p/silk-kurta-1078050.html"));
    }

    #[test]
    fn generic_fields_are_kept() {
        let record = project_tasva(&hit()["_source"], DEFAULT_IMAGE_CDN_TEMPLATE);
        let features: Value = serde_json::from_str(&record.text("Features").unwrap()).unwrap();
        assert_eq!(features, hit()["_source"]["Features"]);
        assert!(record.contains("Media"));
    }

    #[test]
    fn missing_slug_leaves_url_empty() {
        let record = project_tasva(&json!({"ProductID": "A1"}), DEFAULT_IMAGE_CDN_TEMPLATE);
        assert_eq!(record.get("ProductURL"), Some(&FieldValue::Text(String::new())));
        assert_eq!(record.text("PrimaryImageURL"), None);
    }

    #[test]
    fn unsuccessful_response_yields_empty_page() {
        let hits = json!({"products": {"total": 1, "hits": [hit()]}});
        let failed = scraper().parse_page(&json!({"success": false, "results": hits}));
        assert!(failed.candidates.is_empty());
        assert_eq!(failed.meta.total, None);

        let missing = scraper().parse_page(&json!({"results": hits}));
        assert!(missing.candidates.is_empty());

        let ok = scraper().parse_page(&json!({"success": true, "results": hits}));
        assert_eq!(ok.candidates.len(), 1);
        assert_eq!(ok.meta.total, Some(1));
    }

    #[test]
    fn invalid_request_body_is_recognised() {
        assert!(is_invalid_request(r#"{"msg": ["INVALID_REQUEST"], "success": false}"#));
        assert!(!is_invalid_request(r#"{"msg": ["OTHER"]}"#));
        assert!(!is_invalid_request("bad gateway"));
    }
}
