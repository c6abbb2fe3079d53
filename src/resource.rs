//! JSON request and response envelopes for the `check` and `in` commands.

use crate::error::Result;
use crate::metadata::{metadata_fields, MetadataField};
use crate::orchestrator::{FetchOptions, StemcellClient};
use crate::s3::S3Auth;
use crate::types::{SelectionPreference, VersionFilter};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where to look for stemcells.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Source {
    /// Stemcell name, e.g. `bosh-aws-xen-hvm-ubuntu-jammy-go_agent`.
    pub name: String,
    /// Only consider regular builds.
    pub force_regular: bool,
    /// Restrict listings to a version family.
    pub version_family: String,
    /// Credentials for stemcells kept in a private S3-compatible bucket.
    pub auth: Option<S3Auth>,
}

impl Source {
    fn preference(&self) -> SelectionPreference {
        SelectionPreference {
            prefer_regular: self.force_regular,
            prefer_light: !self.force_regular,
        }
    }
}

/// A single version, as exchanged on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRef {
    /// Version string.
    #[serde(default)]
    pub version: String,
}

/// Request read by `check`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CheckRequest {
    /// Catalog source.
    #[serde(default)]
    pub source: Source,
    /// Last version seen; listing starts from it when present.
    #[serde(default)]
    pub version: Option<VersionRef>,
}

/// Options for `in`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InParams {
    /// Download the tarball (default `true`).
    pub tarball: bool,
    /// Keep the upstream file name.
    pub preserve_filename: bool,
}

impl Default for InParams {
    fn default() -> Self {
        Self {
            tarball: true,
            preserve_filename: false,
        }
    }
}

/// Request read by `in`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct InRequest {
    /// Catalog source.
    #[serde(default)]
    pub source: Source,
    /// Version to fetch.
    pub version: VersionRef,
    /// Fetch options.
    #[serde(default)]
    pub params: InParams,
}

/// Response written by `in`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InResponse {
    /// The fetched version.
    pub version: VersionRef,
    /// URL and digests of the fetched variant.
    pub metadata: Vec<MetadataField>,
}

/// Answers a `check` request.
pub async fn check(client: &StemcellClient, request: &CheckRequest) -> Result<Vec<VersionRef>> {
    let family = request.source.version_family.trim();
    let filter = VersionFilter {
        minimum_version: request.version.as_ref().map(|v| v.version.clone()),
        family: (!family.is_empty()).then(|| family.to_string()),
    };

    let versions = client
        .check(&request.source.name, request.source.preference(), &filter)
        .await?;

    Ok(versions
        .into_iter()
        .map(|version| VersionRef { version })
        .collect())
}

/// Answers an `in` request, placing files in `dir`.
pub async fn fetch_into(
    client: &StemcellClient,
    request: &InRequest,
    dir: &Path,
) -> Result<InResponse> {
    let options = FetchOptions {
        tarball: request.params.tarball,
        preserve_filename: request.params.preserve_filename,
        auth: request.source.auth.clone(),
    };

    let fetched = client
        .fetch(
            &request.source.name,
            &request.version.version,
            request.source.preference(),
            dir,
            options,
        )
        .await?;

    Ok(InResponse {
        version: VersionRef {
            version: fetched.record.version,
        },
        metadata: metadata_fields(&fetched.variant),
    })
}
