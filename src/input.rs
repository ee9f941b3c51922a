//! Target-URL list loading.
//!
//! Accepts a CSV file with a `urls` column (header mode) or one URL per line;
//! blank lines and `#` comments are skipped in the headerless form.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Load the target URLs from a tabular file.
pub fn load_target_urls(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .context(format!("failed to read input file: {}", path.display()))?;
    parse_url_rows(&content)
}

/// Parse URL rows from CSV content.
///
/// Header mode is used when the first line names a `urls` (or `url`) column;
/// otherwise each line's first field is taken as the URL.
pub fn parse_url_rows(content: &str) -> Result<Vec<String>> {
    let mut urls = Vec::new();

    let first_line = content.lines().next().unwrap_or("").to_lowercase();
    let has_header = first_line
        .split(',')
        .any(|field| matches!(field.trim(), "urls" | "url"));

    if has_header {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = reader.headers().context("failed to read CSV header")?.clone();
        let url_idx = headers
            .iter()
            .position(|h| matches!(h.trim().to_lowercase().as_str(), "urls" | "url"))
            .context("CSV header has no 'urls' column")?;

        for record in reader.records() {
            let record = record.context("failed to parse CSV record")?;
            if let Some(url) = record
                .get(url_idx)
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                urls.push(url.to_string());
            }
        }
    } else {
        for line in content.lines() {
            let url = line.split(',').next().unwrap_or(line).trim();
            if url.is_empty() || url.starts_with('#') {
                continue;
            }
            urls.push(url.to_string());
        }
    }

    Ok(urls)
}
