use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::StoreError;

pub mod csv;
mod sqlite;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn migrate(&self) -> Result<(), StoreError>;
    async fn upsert(&self, collection: &str, key: &str, document: &Value) -> Result<UpsertOutcome, StoreError>;
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_in_collection: u64,
}

/// Upsert every document by the key `key_fn` derives from it.
pub async fn upsert_all<S, F>(store: &S, collection: &str, documents: &[Value], key_fn: F) -> Result<UpsertSummary, StoreError>
where
    S: KeyedStore + ?Sized,
    F: Fn(&Value) -> Option<String>,
{
    let mut summary = UpsertSummary::default();
    info!("Saving {} documents to collection '{}'", documents.len(), collection);

    for document in documents {
        let Some(key) = key_fn(document).filter(|k| !k.trim().is_empty()) else {
            warn!("Skipping document without identity key: {}", document_label(document));
            summary.skipped += 1;
            continue;
        };

        match store.upsert(collection, &key, document).await {
            Ok(UpsertOutcome::Inserted) => summary.inserted += 1,
            Ok(UpsertOutcome::Updated) => summary.updated += 1,
            Err(e) => {
                error!("Error saving document '{}': {}", key, e);
                summary.failed += 1;
            }
        }
    }

    summary.total_in_collection = store.count(collection).await?;
    info!(
        "Save summary for '{}': {} new, {} updated, {} skipped, {} failed, {} total in collection",
        collection, summary.inserted, summary.updated, summary.skipped, summary.failed, summary.total_in_collection
    );
    Ok(summary)
}

pub fn document_key(field: &'static str) -> impl Fn(&Value) -> Option<String> {
    move |document: &Value| match document.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn document_label(document: &Value) -> String {
    ["handle", "title", "name"]
        .iter()
        .find_map(|k| document.get(*k).and_then(Value::as_str))
        .unwrap_or("unknown")
        .to_string()
}
