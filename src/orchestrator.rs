//! Main orchestration logic for resolving and fetching stemcells.

use crate::catalog::{resolve_variant, CatalogClient};
use crate::download::{fetch_content_length, ParallelDownloader, RangeFetcher};
use crate::error::Result;
use crate::metadata::{destination_file_name, write_metadata};
use crate::progress::ProgressSink;
use crate::s3::{ObjectUrls, S3Auth};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    DownloadOutcome, FetchConfig, SelectionPreference, StemcellRecord, Variant, VersionFilter,
};
use crate::verify::verify_file;
use crate::versions::{list_versions, resolve_exact};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// What to do once the requested version has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Download and verify the tarball, not just the metadata files.
    pub tarball: bool,
    /// Keep the upstream file name instead of `stemcell.tgz`.
    pub preserve_filename: bool,
    /// Credentials for stemcells kept in a private S3-compatible bucket.
    pub auth: Option<S3Auth>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            tarball: true,
            preserve_filename: false,
            auth: None,
        }
    }
}

/// Outcome of [`StemcellClient::fetch`].
#[derive(Debug, Clone)]
pub struct FetchedStemcell {
    /// The resolved catalog record.
    pub record: StemcellRecord,
    /// The variant that was selected.
    pub variant: Variant,
    /// Where the tarball was written and how it verified, if it was downloaded.
    pub download: Option<(PathBuf, DownloadOutcome)>,
}

/// Resolves stemcells against the catalog and downloads them.
pub struct StemcellClient {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
    catalog: CatalogClient,
    progress: Arc<dyn ProgressSink>,
}

impl StemcellClient {
    /// Creates a client backed by a `reqwest` transport.
    pub fn new(config: FetchConfig, progress: Arc<dyn ProgressSink>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, transport, progress))
    }

    /// Creates a client using an existing transport.
    pub fn with_transport(
        config: FetchConfig,
        transport: Arc<dyn Transport>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let catalog = CatalogClient::new(Arc::clone(&transport), &config);
        Self {
            config,
            transport,
            catalog,
            progress,
        }
    }

    /// Lists the versions of `name` matching `filter`, oldest first.
    pub async fn check(
        &self,
        name: &str,
        preference: SelectionPreference,
        filter: &VersionFilter,
    ) -> Result<Vec<String>> {
        let records = self.catalog.fetch_stemcells(name).await?;
        let versions = list_versions(&records, preference, filter)?;
        info!("Found {} matching versions of {}", versions.len(), name);
        Ok(versions)
    }

    /// Resolves `version` of `name`, writes its metadata into `dir` and,
    /// if requested, downloads and verifies the tarball there.
    pub async fn fetch(
        &self,
        name: &str,
        version: &str,
        preference: SelectionPreference,
        dir: &Path,
        options: FetchOptions,
    ) -> Result<FetchedStemcell> {
        let records = self.catalog.fetch_stemcells(name).await?;
        let record = resolve_exact(&records, preference, version)?;
        let variant = resolve_variant(record, preference)?;
        info!("Resolved {} {} to {}", name, version, variant.url);

        write_metadata(record, variant, dir).await?;

        let download = if options.tarball {
            let destination =
                dir.join(destination_file_name(&variant.url, options.preserve_filename)?);
            let outcome = self
                .download_variant(variant, &destination, options.auth.as_ref())
                .await?;
            Some((destination, outcome))
        } else {
            None
        };

        Ok(FetchedStemcell {
            record: record.clone(),
            variant: variant.clone(),
            download,
        })
    }

    /// Downloads `variant` to `destination` and verifies its digest.
    ///
    /// With `auth` configured, the size lookup and every range read use
    /// presigned URLs. On failure the partially written file is left behind.
    pub async fn download_variant(
        &self,
        variant: &Variant,
        destination: &Path,
        auth: Option<&S3Auth>,
    ) -> Result<DownloadOutcome> {
        let urls = ObjectUrls::for_variant(&variant.url, auth)?;
        let total_size =
            fetch_content_length(self.transport.as_ref(), &urls.head, variant.size).await?;

        let fetcher = RangeFetcher::new(Arc::clone(&self.transport), self.config.truncation_retry);
        let downloader =
            ParallelDownloader::new(fetcher, Arc::clone(&self.progress), self.config.workers);
        downloader.download(&urls.get, total_size, destination).await?;

        verify_file(destination, variant).await
    }
}
