use std::collections::HashSet;
use tracing::info;

use crate::models::Record;

/// Key function reading a single field. Absent or empty fields give no key.
pub fn field_key(field: &'static str) -> impl Fn(&Record) -> Option<String> {
    move |record: &Record| record.text(field)
}

pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Stable dedup: keeps the first record per normalized key.
///
/// Records without a key are always kept. Returns the unique records and the
/// number dropped.
pub fn dedupe<F>(records: Vec<Record>, key_fn: F) -> (Vec<Record>, usize)
where
    F: Fn(&Record) -> Option<String>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    let mut duplicates = 0;

    for record in records {
        let key = key_fn(&record)
            .map(|k| normalize_key(&k))
            .filter(|k| !k.is_empty());

        match key {
            Some(key) => {
                if seen.insert(key) {
                    unique.push(record);
                } else {
                    duplicates += 1;
                }
            }
            None => unique.push(record),
        }
    }

    if duplicates > 0 {
        info!("Removed {} duplicate records", duplicates);
    }

    (unique, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: Option<&str>, tag: &str) -> Record {
        let mut r = Record::new();
        if let Some(id) = id {
            r.insert("title", id);
        }
        r.insert("tag", tag);
        r
    }

    #[test]
    fn keeps_first_occurrence() {
        let records = vec![
            rec(Some("Linen Shirt"), "first"),
            rec(Some("  linen shirt "), "second"),
            rec(Some("Denim"), "third"),
        ];
        let (unique, dropped) = dedupe(records, field_key("title"));
        assert_eq!(dropped, 1);
        let tags: Vec<String> = unique.iter().filter_map(|r| r.text("tag")).collect();
        assert_eq!(tags, vec!["first", "third"]);
    }

    #[test]
    fn keyless_records_are_never_duplicates() {
        let records = vec![rec(None, "a"), rec(None, "b"), rec(Some("  "), "c")];
        let (unique, dropped) = dedupe(records, field_key("title"));
        assert_eq!(dropped, 0);
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let records = vec![
            rec(Some("A"), "1"),
            rec(Some("a"), "2"),
            rec(None, "3"),
            rec(Some("B"), "4"),
            rec(Some("b "), "5"),
        ];
        let (once, _) = dedupe(records, field_key("title"));
        let (twice, dropped) = dedupe(once.clone(), field_key("title"));
        assert_eq!(dropped, 0);
        assert_eq!(once, twice);
    }
}
