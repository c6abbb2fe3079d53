//! Presigned access to stemcells held in private S3-compatible buckets.
//!
//! Variant URLs are path-style (`https://host/bucket/key`). With credentials
//! configured, HEAD and ranged GET requests go to SigV4-presigned URLs
//! instead of the plain catalog URL, so the regular transport handles them.

use crate::error::{Result, StemcellError};
use reqwest::Url;
use rusty_s3::{Bucket, Credentials, S3Action, UrlStyle};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Region used for signing; single-region stores such as minio accept it.
pub const DEFAULT_REGION: &str = "us-east-1";

/// How long a presigned URL stays valid. Covers long retry loops.
const PRESIGN_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Static access-key credentials for an S3-compatible store.
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct S3Auth {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
}

impl S3Auth {
    /// True when an access key is configured.
    pub fn is_configured(&self) -> bool {
        !self.access_key.is_empty()
    }
}

impl fmt::Debug for S3Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Auth")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Request URLs for one object, either plain or presigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUrls {
    /// URL for the size lookup.
    pub head: String,
    /// URL for ranged reads.
    pub get: String,
}

impl ObjectUrls {
    /// Both requests go to `url` unchanged.
    pub fn plain(url: &str) -> Self {
        Self {
            head: url.to_string(),
            get: url.to_string(),
        }
    }

    /// Presigned HEAD and GET URLs for the object at `url`.
    pub fn presigned(url: &str, auth: &S3Auth) -> Result<Self> {
        let (endpoint, bucket, key) = split_object_url(url)?;
        let bucket = Bucket::new(endpoint, UrlStyle::Path, bucket, DEFAULT_REGION).map_err(|e| {
            StemcellError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        let credentials = Credentials::new(auth.access_key.clone(), auth.secret_key.clone());

        Ok(Self {
            head: bucket
                .head_object(Some(&credentials), &key)
                .sign(PRESIGN_VALIDITY)
                .to_string(),
            get: bucket
                .get_object(Some(&credentials), &key)
                .sign(PRESIGN_VALIDITY)
                .to_string(),
        })
    }

    /// Presigned URLs when `auth` is configured, plain ones otherwise.
    pub fn for_variant(url: &str, auth: Option<&S3Auth>) -> Result<Self> {
        match auth.filter(|a| a.is_configured()) {
            Some(auth) => Self::presigned(url, auth),
            None => Ok(Self::plain(url)),
        }
    }
}

/// Splits a path-style object URL into endpoint, bucket and key.
fn split_object_url(url: &str) -> Result<(Url, String, String)> {
    let invalid = |reason: &str| StemcellError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    let (bucket, key) = parsed
        .path()
        .trim_start_matches('/')
        .split_once('/')
        .filter(|(bucket, key)| !bucket.is_empty() && !key.is_empty())
        .ok_or_else(|| invalid("expected a /bucket/key path"))?;
    let (bucket, key) = (bucket.to_string(), key.to_string());

    let mut endpoint = parsed;
    endpoint.set_path("/");
    endpoint.set_query(None);
    endpoint.set_fragment(None);

    Ok((endpoint, bucket, key))
}
