//! stemcell-fetch - Resolve and download BOSH stemcells with parallel range requests
//!
//! This library looks up stemcells in a bosh.io-style catalog, picks the
//! right version and variant for the caller's filters, and downloads the
//! tarball with concurrent HTTP range requests before verifying its digest.
//!
//! # Features
//!
//! - **Version Resolution**: Latest-only or "this version and newer" listings, optionally limited to a version family
//! - **Light/Regular Variants**: Light and regular builds are never mixed within one listing
//! - **Parallel Downloads**: One range request per worker, written straight to its file offset
//! - **Truncation Recovery**: Ranges whose body ends early are fetched again from scratch
//! - **Integrity Verification**: SHA-256 when published, SHA-1 otherwise
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stemcell_fetch::{
//!     FetchConfig, FetchOptions, SelectionPreference, SilentProgress, StemcellClient,
//!     VersionFilter,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StemcellClient::new(FetchConfig::default(), Arc::new(SilentProgress::default()))?;
//! let name = "bosh-warden-boshlite-ubuntu-jammy-go_agent";
//!
//! let latest = client
//!     .check(name, SelectionPreference::default(), &VersionFilter::default())
//!     .await?;
//! for version in &latest {
//!     client
//!         .fetch(name, version, SelectionPreference::default(), "/tmp".as_ref(), FetchOptions::default())
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod download;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod ranges;
pub mod resource;
pub mod s3;
pub mod transport;
pub mod types;
pub mod verify;
pub mod versions;

#[cfg(test)]
mod testing;

pub use catalog::{filter_by_type, resolve_variant, CatalogClient};
pub use download::{fetch_content_length, ParallelDownloader, PositionalWriter, RangeFetcher};
pub use error::{Result, StemcellError};
pub use metadata::{destination_file_name, write_metadata};
pub use orchestrator::{FetchOptions, FetchedStemcell, StemcellClient};
pub use progress::{BarProgress, ProgressSink, SilentProgress};
pub use ranges::plan_ranges;
pub use s3::{ObjectUrls, S3Auth};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use types::{
    ByteRange, DigestKind, DownloadOutcome, FetchConfig, RetryPolicy, SelectionPreference,
    StemcellRecord, StemcellVariants, Variant, VersionFilter,
};
pub use verify::{compute_file_digest, verify_file};
pub use versions::{list_versions, parse_tolerant, resolve_exact};
