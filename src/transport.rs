//! HTTP transport with connection-level retry.
//!
//! The [`Transport`] trait is the seam between the resolver/downloader and the
//! network. [`ReqwestTransport`] is the production implementation: it retries
//! connect failures and timeouts on a fixed interval and hands back the body as
//! a byte stream whose failures are classified as [`io::ErrorKind`]s, so callers
//! can tell a truncated body (`UnexpectedEof`) apart from other read errors.

use crate::error::Result;
use crate::types::{ByteRange, FetchConfig, RetryPolicy};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, Method, StatusCode};
use std::fmt;
use std::io;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// Response body as a stream of chunks.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// A request understood by every [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, or a path resolved against the transport's base URL.
    pub url: String,
    /// Optional `Range` header.
    pub range: Option<ByteRange>,
}

impl TransportRequest {
    /// A plain GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            range: None,
        }
    }

    /// A HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self {
            method: Method::HEAD,
            url: url.into(),
            range: None,
        }
    }

    /// Adds a `Range: bytes=start-end` header.
    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Status, length and body of a response.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Value of the `Content-Length` header, if present and numeric.
    pub content_length: Option<u64>,
    /// Body chunks.
    pub body: BodyStream,
}

impl TransportResponse {
    /// Response whose body is already in memory.
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            status,
            content_length: Some(body.len() as u64),
            body: stream::iter(vec![Ok(body)]).boxed(),
        }
    }

    /// Drains the body into memory.
    pub async fn bytes(mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = self.body.try_next().await? {
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Executes HTTP requests, retrying transient connection failures internally.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response head with a streaming body.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// `reqwest`-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ReqwestTransport {
    /// Builds a transport from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.catalog_url.trim_end_matches('/').to_string(),
            retry: config.transport_retry,
        })
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            url.to_string()
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = self.resolve_url(&request.url);

        let response = Retry::spawn(self.retry.strategy(), || {
            let mut builder = self.client.request(request.method.clone(), &url);
            if let Some(range) = request.range {
                builder = builder.header(RANGE, range.header_value());
            }
            let url = &url;

            async move {
                match builder.send().await {
                    Ok(response) => Ok(response),
                    Err(e) if is_transient(&e) => {
                        warn!("Retrying {} on temporary error: {}", url, e);
                        RetryError::to_transient(e)
                    }
                    Err(e) => RetryError::to_permanent(e),
                }
            }
        })
        .await?;

        let status = response.status();
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        debug!(
            "{} {} -> {} (content-length {:?})",
            request.method, url, status, content_length
        );

        Ok(TransportResponse {
            status,
            content_length,
            body: response.bytes_stream().map_err(body_error).boxed(),
        })
    }
}

/// Connection-level failures worth another attempt.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Maps a body read failure onto an [`io::ErrorKind`] the downloader can classify.
///
/// Only a body cut short by the peer counts as truncation; decode and other
/// failures are not retryable.
fn body_error(err: reqwest::Error) -> io::Error {
    io::Error::new(body_error_kind(err.is_timeout(), err.is_body()), err)
}

fn body_error_kind(is_timeout: bool, is_body: bool) -> io::ErrorKind {
    if is_timeout {
        io::ErrorKind::TimedOut
    } else if is_body {
        io::ErrorKind::UnexpectedEof
    } else {
        io::ErrorKind::Other
    }
}
