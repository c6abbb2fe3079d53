//! Parallel range download functionality.

use crate::error::{Result, StemcellError};
use crate::progress::ProgressSink;
use crate::ranges::plan_ranges;
use crate::transport::{Transport, TransportRequest};
use crate::types::{ByteRange, RetryPolicy};
use futures_util::TryStreamExt;
use reqwest::StatusCode;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, info, warn};

/// Looks up the authoritative size of `url` with a HEAD request.
///
/// Falls back to `advertised_size` (the catalog's figure) when the response
/// carries no usable `Content-Length`.
pub async fn fetch_content_length(
    transport: &dyn Transport,
    url: &str,
    advertised_size: u64,
) -> Result<u64> {
    let response = transport.execute(TransportRequest::head(url)).await?;
    if !response.status.is_success() {
        return Err(StemcellError::UpstreamStatus {
            context: format!("failed to fetch object metadata for {}", url),
            status: response.status.as_u16(),
        });
    }

    match response.content_length.filter(|length| *length > 0) {
        Some(length) => Ok(length),
        None if advertised_size > 0 => {
            warn!(
                "Content-Length missing for {}, using catalog size of {} bytes",
                url, advertised_size
            );
            Ok(advertised_size)
        }
        None => Err(StemcellError::MissingContentLength {
            url: url.to_string(),
        }),
    }
}

/// Fetches one byte range, retrying transfers that end early.
#[derive(Clone)]
pub struct RangeFetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl RangeFetcher {
    /// Creates a fetcher that retries truncated bodies according to `retry`.
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Returns exactly the bytes of `range`.
    ///
    /// Anything other than `206 Partial Content` is fatal. A body that ends
    /// before the range is complete, or that fails with a temporary read
    /// error, is requested again from scratch.
    pub async fn fetch(&self, url: &str, range: ByteRange) -> Result<Vec<u8>> {
        Retry::spawn(self.retry.strategy(), || async move {
            match self.fetch_once(url, range).await {
                Ok(data) => Ok(data),
                Err(e) if is_interrupted_transfer(&e) => {
                    warn!("Retrying range {} of {} after interrupted transfer: {}", range, url, e);
                    RetryError::to_transient(e)
                }
                Err(e) => RetryError::to_permanent(e),
            }
        })
        .await
    }

    async fn fetch_once(&self, url: &str, range: ByteRange) -> Result<Vec<u8>> {
        let mut response = self
            .transport
            .execute(TransportRequest::get(url).with_range(range))
            .await?;

        if response.status != StatusCode::PARTIAL_CONTENT {
            return Err(StemcellError::UpstreamStatus {
                context: "failed to download stemcell".to_string(),
                status: response.status.as_u16(),
            });
        }

        let expected = range.size();
        let mut data = Vec::with_capacity(buffer_capacity(range)?);
        while let Some(chunk) = response.body.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        let received = data.len() as u64;
        if received < expected {
            return Err(StemcellError::TruncatedBody {
                start: range.start,
                end: range.end,
                received,
                expected,
            });
        }
        if received > expected {
            return Err(StemcellError::UnexpectedBodyLength {
                start: range.start,
                end: range.end,
                received,
                expected,
            });
        }

        Ok(data)
    }
}

/// In-memory buffer size for `range`, rejecting ranges the platform cannot address.
fn buffer_capacity(range: ByteRange) -> Result<usize> {
    usize::try_from(range.size()).map_err(|_| StemcellError::RangeTooLarge {
        start: range.start,
        end: range.end,
    })
}

fn is_interrupted_transfer(err: &StemcellError) -> bool {
    match err {
        StemcellError::TruncatedBody { .. } => true,
        StemcellError::IoError(e) => matches!(
            e.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::TimedOut
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::Interrupted
        ),
        _ => false,
    }
}

/// Shared handle to the destination file that only permits writes at explicit offsets.
///
/// Concurrent writers never coordinate: each one owns a disjoint range.
#[derive(Debug, Clone)]
pub struct PositionalWriter {
    file: Arc<File>,
}

impl PositionalWriter {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: Arc::new(File::create(path)?),
        })
    }

    /// Writes all of `data` starting at `offset`, returning the byte count.
    pub async fn write_at(&self, data: Vec<u8>, offset: u64) -> Result<u64> {
        let file = Arc::clone(&self.file);

        tokio::task::spawn_blocking(move || {
            write_all_at(&file, &data, offset)?;
            Ok::<u64, StemcellError>(data.len() as u64)
        })
        .await
        .map_err(|e| StemcellError::TaskFailed(format!("write task: {}", e)))?
    }
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut data: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        match file.seek_write(data, offset) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => {
                data = &data[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Downloads an object with one concurrent range request per worker.
pub struct ParallelDownloader {
    fetcher: RangeFetcher,
    progress: Arc<dyn ProgressSink>,
    workers: usize,
}

impl ParallelDownloader {
    /// Creates a downloader issuing up to `workers` concurrent range requests.
    pub fn new(fetcher: RangeFetcher, progress: Arc<dyn ProgressSink>, workers: usize) -> Self {
        Self {
            fetcher,
            progress,
            workers,
        }
    }

    /// Downloads `total_size` bytes of `url` into `destination`.
    ///
    /// Ranges complete in any order; each lands at its own offset. The first
    /// failing range aborts the rest and its error is returned. A partially
    /// written file is left in place for the caller to discard.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    pub async fn download(&self, url: &str, total_size: u64, destination: &Path) -> Result<u64> {
        let ranges = plan_ranges(total_size, self.workers)?;
        let writer = PositionalWriter::create(destination)?;

        self.progress.set_total(total_size);
        self.progress.start();
        info!(
            "⬇️  Downloading {} ({} bytes) with {} range requests",
            url,
            total_size,
            ranges.len()
        );

        let url: Arc<str> = Arc::from(url);
        let mut tasks = JoinSet::new();
        for range in ranges {
            let fetcher = self.fetcher.clone();
            let writer = writer.clone();
            let progress = Arc::clone(&self.progress);
            let url = Arc::clone(&url);

            tasks.spawn(async move {
                let data = fetcher.fetch(&url, range).await?;
                let written = writer.write_at(data, range.start).await?;
                let cumulative = progress.add(written);
                debug!("Range {} written, {} bytes so far", range, cumulative);
                Ok::<u64, StemcellError>(written)
            });
        }

        let mut bytes_written = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(written)) => bytes_written += written,
                Ok(Err(e)) => {
                    error!("Range download failed: {}", e);
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    error!("Task join error: {}", e);
                    tasks.abort_all();
                    return Err(StemcellError::TaskFailed(format!("range task: {}", e)));
                }
            }
        }

        self.progress.finish();
        Ok(bytes_written)
    }
}
