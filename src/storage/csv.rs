use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{Record, Source};

pub fn ordered_fields(records: &[Record], preferred: &[&str]) -> Vec<String> {
    let mut remaining: BTreeSet<&str> = records.iter().flat_map(Record::keys).collect();

    let mut fields: Vec<String> = Vec::with_capacity(remaining.len());
    for field in preferred {
        if remaining.remove(field) {
            fields.push(field.to_string());
        }
    }
    fields.extend(remaining.into_iter().map(str::to_string));
    fields
}

pub fn default_csv_name(source: Source, now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("{}_products_{}.csv", source.key(), now.format("%Y%m%d_%H%M%S")))
}

/// Write records as CSV, one row each, missing fields left empty.
pub fn write_records(path: &Path, records: &[Record], preferred: &[&str]) -> Result<usize> {
    if records.is_empty() {
        warn!("No records to save");
        return Ok(0);
    }

    let fields = ordered_fields(records, preferred);
    let tmp = temp_path(path);

    {
        let mut writer = ::csv::Writer::from_path(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        writer.write_record(&fields)?;

        for record in records {
            let row = fields
                .iter()
                .map(|f| record.get(f).map(|v| v.to_cell()).unwrap_or_default());
            writer.write_record(row)?;
        }
        writer.flush()?;
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;

    info!("Saved {} records to {}", records.len(), path.display());
    Ok(records.len())
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record(pairs: &[(&str, &str)]) -> Record {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.insert(*k, *v);
        }
        r
    }

    #[test]
    fn preferred_prefix_then_sorted() {
        let records = vec![
            record(&[("zeta", "1"), ("title", "A"), ("alpha", "x")]),
            record(&[("id", "2"), ("beta", "y")]),
        ];
        let fields = ordered_fields(&records, &["id", "title", "price"]);
        assert_eq!(fields, vec!["id", "title", "alpha", "beta", "zeta"]);
    }

    #[test]
    fn writes_header_and_blank_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut with_null = record(&[("id", "1"), ("note", "a, \"quoted\" value")]);
        with_null.insert("flag", crate::models::FieldValue::Null);
        let records = vec![with_null, record(&[("id", "2"), ("extra", "e")])];

        let written = write_records(&path, &records, &["id"]).unwrap();
        assert_eq!(written, 2);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,extra,flag,note");
        assert_eq!(lines[1], "1,,,\"a, \"\"quoted\"\" value\"");
        assert_eq!(lines[2], "2,e,,");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn empty_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.csv");
        assert_eq!(write_records(&path, &[], &[]).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn default_name_has_timestamp() {
        let now = Local.with_ymd_and_hms(2026, 1, 18, 0, 47, 33).unwrap();
        assert_eq!(
            default_csv_name(Source::Tasva, now),
            PathBuf::from("tasva_products_20260118_004733.csv")
        );
    }
}
