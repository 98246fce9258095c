use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SourceConfig};
use crate::error::FetchError;
use crate::extract::truncate_excerpt;

const DECODE_EXCERPT_CHARS: usize = 2000;
const STATUS_EXCERPT_CHARS: usize = 500;

/// Build a client carrying the source's default headers.
pub fn create_client(config: &Config, source: &SourceConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &source.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name '{}'", name))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header '{}'", name))?;
        headers.insert(name, value);
    }

    let client = ClientBuilder::new()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .cookie_store(true)
        .build()?;

    Ok(client)
}

pub async fn get_json<Q: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    query: &Q,
) -> Result<Value, FetchError> {
    match serde_urlencoded::to_string(query) {
        Ok(qs) if !qs.is_empty() => info!("GET {}?{}", url, qs),
        _ => info!("GET {}", url),
    }
    send_json(client.get(url).query(query)).await
}

pub async fn send_json(request: RequestBuilder) -> Result<Value, FetchError> {
    let response = request.send().await.map_err(|e| {
        error!("Request error: {}", e);
        FetchError::from(e)
    })?;
    read_json(response).await
}

/// Check the status and decode the body as JSON, logging diagnostics on failure.
pub async fn read_json(response: Response) -> Result<Value, FetchError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let body = response.text().await?;
    debug!("Response {} ({}, {} bytes)", status, content_type, body.len());

    if !status.is_success() {
        let body_excerpt = truncate_excerpt(&body, STATUS_EXCERPT_CHARS);
        warn!("HTTP error {}: {}", status, body_excerpt);
        return Err(FetchError::Status {
            status: status.as_u16(),
            body_excerpt,
        });
    }

    decode_json(&body)
}

pub fn decode_json(body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body).map_err(|e| {
        let body_excerpt = truncate_excerpt(body, DECODE_EXCERPT_CHARS);
        error!("JSON parsing error at line {} column {}: {}", e.line(), e.column(), e);
        error!("Raw response: {}", body_excerpt);
        FetchError::Decode {
            message: e.to_string(),
            body_excerpt,
        }
    })
}

/// GET a text body (sitemaps), failing on non-2xx.
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!("HTTP error {}: {}", status, url);
        return Err(FetchError::Status {
            status: status.as_u16(),
            body_excerpt: truncate_excerpt(&body, STATUS_EXCERPT_CHARS),
        });
    }
    Ok(body)
}
