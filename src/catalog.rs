//! Catalog lookups and variant selection.

use crate::error::{Result, StemcellError};
use crate::transport::{Transport, TransportRequest};
use crate::types::{FetchConfig, SelectionPreference, StemcellRecord, Variant};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{debug, info};

/// Lists the published versions of a stemcell.
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    path_template: String,
}

impl CatalogClient {
    /// Creates a client issuing listing requests through `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: &FetchConfig) -> Self {
        Self {
            transport,
            path_template: config.catalog_path_template.clone(),
        }
    }

    /// Path of the listing for `name`, relative to the catalog URL.
    pub fn listing_path(&self, name: &str) -> String {
        self.path_template.replace("{name}", name)
    }

    /// Fetches every published record for the stemcell `name`.
    ///
    /// Any status other than `200 OK` is fatal and carries the status code.
    pub async fn fetch_stemcells(&self, name: &str) -> Result<Vec<StemcellRecord>> {
        let path = self.listing_path(name);
        info!("Retrieving stemcell catalog from {}", path);

        let response = self.transport.execute(TransportRequest::get(path)).await?;
        if response.status != StatusCode::OK {
            return Err(StemcellError::UpstreamStatus {
                context: "failed fetching metadata".to_string(),
                status: response.status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let records: Vec<StemcellRecord> = serde_json::from_slice(&body)?;
        debug!("Catalog lists {} records for {}", records.len(), name);

        Ok(records)
    }
}

/// Picks the variant to download for `record`.
///
/// Regular builds are returned when `preference.prefer_regular` is set and
/// the record has one. Otherwise the light build wins if it exists, falling
/// back to the regular build.
pub fn resolve_variant(
    record: &StemcellRecord,
    preference: SelectionPreference,
) -> Result<&Variant> {
    let variant = if preference.prefer_regular {
        record.regular()
    } else {
        record.light().or_else(|| record.regular())
    };

    variant.ok_or_else(|| StemcellError::NoVariantAvailable {
        version: record.version.clone(),
    })
}

/// Restricts a catalog to a single variant type.
///
/// Catalogs that never publish light builds are returned unchanged.
/// Otherwise only records with the preferred type remain, so that light and
/// regular versions never mix in one listing.
pub fn filter_by_type(
    records: &[StemcellRecord],
    preference: SelectionPreference,
) -> Vec<&StemcellRecord> {
    if !records.iter().any(|r| r.light().is_some()) {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|r| {
            if preference.prefer_regular {
                r.regular().is_some()
            } else {
                r.light().is_some()
            }
        })
        .collect()
}
