//! Data structures shared by the resolver and the downloader.

use crate::error::StemcellError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio_retry2::strategy::FixedInterval;

/// One concrete downloadable form of a stemcell.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Variant {
    /// Download location of the tarball.
    pub url: String,
    /// Size advertised by the catalog, in bytes.
    #[serde(default)]
    pub size: u64,
    /// MD5 digest (informational only).
    #[serde(default)]
    pub md5: String,
    /// SHA-1 digest, hex encoded.
    #[serde(default)]
    pub sha1: String,
    /// SHA-256 digest, hex encoded. Empty when the catalog does not publish one.
    #[serde(default)]
    pub sha256: String,
}

/// The variants a catalog entry was published with.
///
/// Light and regular builds are published on independent schedules, so an
/// entry may carry either one or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StemcellVariants {
    /// Only a light build exists.
    LightOnly(Variant),
    /// Only a regular build exists.
    RegularOnly(Variant),
    /// Both builds exist.
    Both {
        /// The light build.
        light: Variant,
        /// The regular build.
        regular: Variant,
    },
}

impl StemcellVariants {
    /// The light build, if published.
    pub fn light(&self) -> Option<&Variant> {
        match self {
            Self::LightOnly(light) | Self::Both { light, .. } => Some(light),
            Self::RegularOnly(_) => None,
        }
    }

    /// The regular build, if published.
    pub fn regular(&self) -> Option<&Variant> {
        match self {
            Self::RegularOnly(regular) | Self::Both { regular, .. } => Some(regular),
            Self::LightOnly(_) => None,
        }
    }
}

/// Catalog entry as it appears on the wire.
#[derive(Deserialize)]
struct RawStemcell {
    #[serde(default)]
    name: String,
    version: String,
    #[serde(default)]
    light: Option<Variant>,
    #[serde(default)]
    regular: Option<Variant>,
}

/// A named, versioned catalog entry.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawStemcell")]
pub struct StemcellRecord {
    /// Stemcell name.
    pub name: String,
    /// Version string as published (e.g. `"3262.4"`).
    pub version: String,
    /// Published builds.
    pub variants: StemcellVariants,
}

impl StemcellRecord {
    /// Builds a record, rejecting entries without any variant.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        light: Option<Variant>,
        regular: Option<Variant>,
    ) -> Result<Self, StemcellError> {
        let version = version.into();
        let variants = match (light, regular) {
            (Some(light), Some(regular)) => StemcellVariants::Both { light, regular },
            (Some(light), None) => StemcellVariants::LightOnly(light),
            (None, Some(regular)) => StemcellVariants::RegularOnly(regular),
            (None, None) => return Err(StemcellError::InvalidCatalogRecord { version }),
        };
        Ok(Self {
            name: name.into(),
            version,
            variants,
        })
    }

    /// The light build, if published.
    pub fn light(&self) -> Option<&Variant> {
        self.variants.light()
    }

    /// The regular build, if published.
    pub fn regular(&self) -> Option<&Variant> {
        self.variants.regular()
    }
}

impl TryFrom<RawStemcell> for StemcellRecord {
    type Error = StemcellError;

    fn try_from(raw: RawStemcell) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.version, raw.light, raw.regular)
    }
}

/// Caller preference between light and regular builds.
///
/// With both flags unset, light builds are used once they exist. When both
/// are set, `prefer_regular` wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPreference {
    /// Only consider regular builds.
    pub prefer_regular: bool,
    /// Prefer light builds (the default behavior).
    pub prefer_light: bool,
}

impl SelectionPreference {
    /// Preference that forces regular builds.
    pub fn regular() -> Self {
        Self {
            prefer_regular: true,
            prefer_light: false,
        }
    }
}

/// Inclusive byte range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Digest algorithm used to verify a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    /// SHA-1, used when the catalog publishes no SHA-256.
    Sha1,
    /// SHA-256.
    Sha256,
}

impl DigestKind {
    /// Lowercase algorithm name, as used in metadata file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

/// Result of a successful, verified download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Bytes written to the destination file.
    pub bytes_written: u64,
    /// Algorithm the file was verified with.
    pub verified_digest: DigestKind,
}

/// Version constraints supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionFilter {
    /// Inclusive lower bound. When unset only the latest version is returned.
    pub minimum_version: Option<String>,
    /// Version prefix such as `"3262"` or `"3262.4"`.
    pub family: Option<String>,
}

/// Fixed-interval retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Maximum number of retries after the first attempt. `None` retries forever.
    pub max_attempts: Option<usize>,
}

impl RetryPolicy {
    /// Unbounded retry with the given interval.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Delay sequence for `tokio_retry2::Retry`.
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        FixedInterval::new(self.interval).take(self.max_attempts.unwrap_or(usize::MAX))
    }
}

/// Configuration for catalog lookups and downloads.
///
/// # Example
///
/// ```
/// use stemcell_fetch::FetchConfig;
///
/// let config = FetchConfig {
///     workers: 4,
///     ..FetchConfig::default()
/// };
/// assert_eq!(config.catalog_url, "https://bosh.io");
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL of the catalog service; host-relative request paths resolve against it.
    pub catalog_url: String,
    /// Listing path, with `{name}` replaced by the stemcell name.
    pub catalog_path_template: String,
    /// Number of concurrent range requests (default: 10).
    pub workers: usize,
    /// Retry settings for connection-level failures inside the transport.
    pub transport_retry: RetryPolicy,
    /// Retry settings for ranged responses that end early.
    pub truncation_retry: RetryPolicy,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://bosh.io".to_string(),
            catalog_path_template: "/api/v1/stemcells/{name}?all=1".to_string(),
            workers: 10,
            transport_retry: RetryPolicy::unbounded(Duration::from_secs(5 * 60)),
            truncation_retry: RetryPolicy::unbounded(Duration::from_secs(1)),
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("stemcell-fetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_parses_light_and_regular() {
        let json = r#"{
            "name": "bosh-aws-xen-hvm-ubuntu-jammy-go_agent",
            "version": "1.108",
            "light": {"url": "https://example.com/light.tgz", "size": 10, "md5": "m", "sha1": "a", "sha256": "b"},
            "regular": {"url": "https://example.com/regular.tgz", "size": 20, "md5": "n", "sha1": "c"}
        }"#;

        let record: StemcellRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.version, "1.108");
        assert_eq!(record.light().unwrap().sha256, "b");
        assert_eq!(record.regular().unwrap().size, 20);
        assert_eq!(record.regular().unwrap().sha256, "");
        assert!(matches!(record.variants, StemcellVariants::Both { .. }));
    }

    #[test]
    fn test_record_with_null_light_is_regular_only() {
        let json = r#"{"name": "s", "version": "3", "light": null,
                       "regular": {"url": "https://example.com/r.tgz", "sha1": "c"}}"#;

        let record: StemcellRecord = serde_json::from_str(json).unwrap();
        assert!(record.light().is_none());
        assert!(matches!(record.variants, StemcellVariants::RegularOnly(_)));
    }

    #[test]
    fn test_record_without_variants_is_rejected() {
        let result = serde_json::from_str::<StemcellRecord>(r#"{"name": "s", "version": "3"}"#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("neither a light nor a regular"));
    }

    #[test]
    fn test_byte_range_header() {
        let range = ByteRange { start: 10, end: 19 };
        assert_eq!(range.size(), 10);
        assert_eq!(range.header_value(), "bytes=10-19");
        assert_eq!(range.to_string(), "10-19");
    }

    #[test]
    fn test_retry_policy_bounded_strategy() {
        let policy = RetryPolicy {
            interval: Duration::from_millis(5),
            max_attempts: Some(3),
        };
        let delays: Vec<_> = policy.strategy().collect();
        assert_eq!(delays, vec![Duration::from_millis(5); 3]);
    }
}
