//! Error types for stemcell resolution and download operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while resolving or fetching a stemcell.
#[derive(Error, Debug)]
pub enum StemcellError {
    /// I/O error during file operations, surfaced verbatim.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// HTTP request error that the transport could not recover from.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// A range plan was requested for an empty or unknown-length object.
    #[error("invalid content length {0}: cannot plan byte ranges for an empty object")]
    InvalidSize(u64),

    /// A range plan was requested with zero workers.
    #[error("invalid worker count {0}: at least one worker is required")]
    InvalidWorkerCount(usize),

    /// A version string in the catalog or in caller input failed to parse.
    #[error("invalid version '{value}': {reason}")]
    InvalidVersion {
        /// The offending version string.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The requested version is not in the (type-filtered) catalog.
    #[error("stemcell version {version} not found")]
    VersionNotFound {
        /// The version that was requested.
        version: String,
    },

    /// The record matched but carries no variant usable under the preference.
    #[error("stemcell version {version} has no downloadable variant for the requested type")]
    NoVariantAvailable {
        /// Version of the record that had no usable variant.
        version: String,
    },

    /// A catalog entry advertised neither a light nor a regular variant.
    #[error("catalog entry for version {version} has neither a light nor a regular variant")]
    InvalidCatalogRecord {
        /// Version of the malformed entry.
        version: String,
    },

    /// The upstream answered with an unexpected HTTP status.
    #[error("{context}: upstream returned {status}")]
    UpstreamStatus {
        /// What was being attempted.
        context: String,
        /// The HTTP status code received.
        status: u16,
    },

    /// A variant URL could not be parsed.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Neither the HEAD response nor the catalog provided a content length.
    #[error("could not determine content length for {url}")]
    MissingContentLength {
        /// URL whose size was requested.
        url: String,
    },

    /// A range is larger than this platform can buffer in memory.
    #[error("range bytes={start}-{end} is too large to buffer on this platform")]
    RangeTooLarge {
        /// First byte of the range.
        start: u64,
        /// Last byte of the range (inclusive).
        end: u64,
    },

    /// A ranged response ended before delivering every requested byte.
    #[error("range bytes={start}-{end} truncated: received {received} of {expected} bytes")]
    TruncatedBody {
        /// First byte of the range.
        start: u64,
        /// Last byte of the range (inclusive).
        end: u64,
        /// Bytes actually received.
        received: u64,
        /// Bytes the range asked for.
        expected: u64,
    },

    /// A ranged response delivered more bytes than requested.
    #[error("range bytes={start}-{end} returned {received} bytes, expected {expected}")]
    UnexpectedBodyLength {
        /// First byte of the range.
        start: u64,
        /// Last byte of the range (inclusive).
        end: u64,
        /// Bytes actually received.
        received: u64,
        /// Bytes the range asked for.
        expected: u64,
    },

    /// The assembled file does not hash to the catalog digest.
    #[error("computed {algorithm} {actual} did not match expected {algorithm} of {expected}")]
    ChecksumMismatch {
        /// Digest algorithm name (`sha1` or `sha256`).
        algorithm: &'static str,
        /// Digest published by the catalog.
        expected: String,
        /// Digest computed over the local file.
        actual: String,
    },

    /// A background task panicked or was cancelled.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, StemcellError>;
