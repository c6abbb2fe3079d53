//! Metadata files written next to a fetched stemcell.

use crate::error::{Result, StemcellError};
use crate::types::{StemcellRecord, Variant};
use reqwest::Url;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// File name used unless the upstream name is preserved.
pub const DEFAULT_FILE_NAME: &str = "stemcell.tgz";

/// One `name`/`value` pair reported back to the caller.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MetadataField {
    /// Field name (`url`, `sha1`, `sha256`).
    pub name: String,
    /// Field value.
    pub value: String,
}

/// Metadata written to disk for `variant`, as `(file name, contents)` pairs.
///
/// `sha256` is only included when the catalog publishes one.
pub fn metadata_files(record: &StemcellRecord, variant: &Variant) -> Vec<(&'static str, String)> {
    let mut files = vec![
        ("version", record.version.clone()),
        ("url", variant.url.clone()),
        ("sha1", variant.sha1.clone()),
    ];
    if !variant.sha256.is_empty() {
        files.push(("sha256", variant.sha256.clone()));
    }
    files
}

/// Metadata fields reported in the `in` response.
pub fn metadata_fields(variant: &Variant) -> Vec<MetadataField> {
    let mut fields = vec![
        MetadataField {
            name: "url".to_string(),
            value: variant.url.clone(),
        },
        MetadataField {
            name: "sha1".to_string(),
            value: variant.sha1.clone(),
        },
    ];
    if !variant.sha256.is_empty() {
        fields.push(MetadataField {
            name: "sha256".to_string(),
            value: variant.sha256.clone(),
        });
    }
    fields
}

/// Writes the `version`, `url`, `sha1` and (if known) `sha256` files into `dir`.
///
/// Values are written as-is, without a trailing newline.
pub async fn write_metadata(record: &StemcellRecord, variant: &Variant, dir: &Path) -> Result<()> {
    for (name, contents) in metadata_files(record, variant) {
        tokio::fs::write(dir.join(name), contents).await?;
    }
    info!("Wrote metadata for version {} to {}", record.version, dir.display());
    Ok(())
}

/// Name of the local tarball for `url`.
///
/// With `preserve_filename` the last path segment of the URL is used,
/// otherwise [`DEFAULT_FILE_NAME`].
pub fn destination_file_name(url: &str, preserve_filename: bool) -> Result<String> {
    if !preserve_filename {
        return Ok(DEFAULT_FILE_NAME.to_string());
    }

    let parsed = Url::parse(url).map_err(|e| StemcellError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
    {
        Some(segment) => Ok(segment.to_string()),
        None => {
            warn!("No file name in {}, using {}", url, DEFAULT_FILE_NAME);
            Ok(DEFAULT_FILE_NAME.to_string())
        }
    }
}
