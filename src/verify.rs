//! Integrity verification of assembled downloads.

use crate::error::{Result, StemcellError};
use crate::types::{DigestKind, DownloadOutcome, Variant};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Read buffer for hashing (1MB).
const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Computes the digest of a local file.
///
/// The file is streamed through the hasher in 1MB chunks on a blocking
/// task, so large stemcells never sit in memory as a whole.
///
/// # Returns
///
/// The digest as a lowercase hexadecimal string.
pub async fn compute_file_digest(path: &Path, kind: DigestKind) -> Result<String> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || match kind {
        DigestKind::Sha1 => hash_file::<Sha1>(&path),
        DigestKind::Sha256 => hash_file::<Sha256>(&path),
    })
    .await
    .map_err(|e| StemcellError::TaskFailed(format!("digest task: {}", e)))?
}

fn hash_file<D: Digest>(path: &Path) -> Result<String> {
    use std::io::Read;

    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut hasher = D::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Picks the digest to verify with: SHA-256 when published, SHA-1 otherwise.
pub fn digest_kind_for(expected: &Variant) -> DigestKind {
    if expected.sha256.is_empty() {
        DigestKind::Sha1
    } else {
        DigestKind::Sha256
    }
}

/// Verifies a downloaded file against the digests published for `expected`.
///
/// Exactly one digest pass is made over the file. A mismatch is fatal and
/// reports both the computed and the expected value.
pub async fn verify_file(path: &Path, expected: &Variant) -> Result<DownloadOutcome> {
    let kind = digest_kind_for(expected);
    let expected_digest = match kind {
        DigestKind::Sha1 => &expected.sha1,
        DigestKind::Sha256 => &expected.sha256,
    };

    let bytes_written = tokio::fs::metadata(path).await?.len();
    let actual = compute_file_digest(path, kind).await?;

    if !actual.eq_ignore_ascii_case(expected_digest) {
        return Err(StemcellError::ChecksumMismatch {
            algorithm: kind.name(),
            expected: expected_digest.clone(),
            actual,
        });
    }

    info!("✅ {} verified for {}", kind.name(), path.display());
    Ok(DownloadOutcome {
        bytes_written,
        verified_digest: kind,
    })
}
