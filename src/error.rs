use thiserror::Error;

/// Why a single page fetch produced nothing usable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body_excerpt}")]
    Status { status: u16, body_excerpt: String },

    #[error("could not decode response: {message}")]
    Decode { message: String, body_excerpt: String },

    #[error("request rejected by source: {reason}")]
    Rejected { reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document for key '{0}' is not a JSON object")]
    NotAnObject(String),
}
