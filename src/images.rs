use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::storage::csv::temp_path;

pub const URL_COLUMNS: [&str; 4] = ["ImageURLs", "ImageURLs_JSON", "PrimaryImageURL", "SwatchImageURL"];

/// Substitute an image identifier into a CDN URL template (`{id}` placeholder).
pub fn image_url(template: &str, image_id: &str) -> String {
    template.replace("{id}", image_id)
}

/// Split a comma-separated identifier list, dropping blanks, keeping order.
pub fn parse_image_ids(images: &str) -> Vec<String> {
    images
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read `Name` from each object of a serialized image array.
pub fn parse_image_ids_json(images_json: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(images_json) {
        Ok(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("Name").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

pub fn strip_image_extension(id: &str) -> String {
    id.replace(".jpg", "").replace(".jpeg", "")
}

pub fn swatch_url(template: &str, swatch: &str) -> String {
    if swatch.trim().is_empty() {
        String::new()
    } else {
        image_url(template, &strip_image_extension(swatch.trim()))
    }
}

/// The four derived URL columns for one row, in [`URL_COLUMNS`] order.
pub fn url_columns(template: &str, ids: &[String], swatch: &str) -> [String; 4] {
    let urls: Vec<String> = ids.iter().map(|id| image_url(template, id)).collect();
    [
        urls.join(", "),
        serde_json::to_string(&urls).unwrap_or_else(|_| "[]".to_string()),
        urls.first().cloned().unwrap_or_default(),
        swatch_url(template, swatch),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReport {
    pub output: PathBuf,
    pub rows_processed: usize,
    pub rows_with_images: usize,
}

pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_with_urls.csv", stem))
}

/// Copy a product CSV, inserting derived image URL columns after `Images`.
pub fn add_image_urls(input: &Path, output: Option<&Path>, template: &str) -> Result<ImageReport> {
    if !input.exists() {
        bail!("File not found: {}", input.display());
    }
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));
    info!("Processing {} -> {}", input.display(), output.display());

    let mut reader = ::csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let raw_headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    // URL columns from an earlier pass are rebuilt, not duplicated.
    let kept: Vec<usize> = (0..raw_headers.len())
        .filter(|&i| !URL_COLUMNS.contains(&raw_headers[i].as_str()))
        .collect();
    let headers: Vec<String> = kept.iter().map(|&i| raw_headers[i].clone()).collect();

    let col = |name: &str| headers.iter().position(|h| h == name);
    let images_idx = col("Images");
    let images_json_idx = col("Images_JSON");
    let swatch_idx = col("Swatch");
    let insert_at = images_idx.map(|i| i + 1).unwrap_or(headers.len());

    let mut out_headers = headers.clone();
    out_headers.splice(insert_at..insert_at, URL_COLUMNS.iter().map(|c| c.to_string()));

    let tmp = temp_path(&output);
    let mut report = ImageReport {
        output: output.clone(),
        ..Default::default()
    };

    {
        let mut writer = ::csv::Writer::from_path(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        writer.write_record(&out_headers)?;

        for row in reader.records() {
            let row = row?;
            // Short rows are padded so the new columns land under their headers.
            let mut values: Vec<String> = kept
                .iter()
                .map(|&i| row.get(i).unwrap_or("").to_string())
                .collect();
            let cell = |idx: Option<usize>| idx.map(|i| values[i].clone()).unwrap_or_default();

            let mut ids = parse_image_ids(&cell(images_idx));
            if ids.is_empty() {
                ids = parse_image_ids_json(&cell(images_json_idx));
            }
            if !ids.is_empty() {
                report.rows_with_images += 1;
            }

            let derived = url_columns(template, &ids, &cell(swatch_idx));
            values.splice(insert_at..insert_at, derived);

            writer.write_record(&values)?;
            report.rows_processed += 1;
        }
        writer.flush()?;
    }

    fs::rename(&tmp, &output)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;

    info!("Processed {} rows, {} with images", report.rows_processed, report.rows_with_images);
    Ok(report)
}
