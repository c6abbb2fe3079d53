//! Download progress reporting.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives progress notifications from the downloader.
///
/// Purely observational: implementations must never influence the download.
pub trait ProgressSink: Send + Sync {
    /// Sets the expected total, once, before any bytes are written.
    fn set_total(&self, total_bytes: u64);
    /// Records `bytes_written` more bytes and returns the running total.
    fn add(&self, bytes_written: u64) -> u64;
    /// Called right before the first range request is issued.
    fn start(&self);
    /// Called after every range has been written.
    fn finish(&self);
}

/// Terminal progress bar drawn on stderr.
#[derive(Debug, Clone)]
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    /// Creates a bar that stays hidden when stderr is not a terminal.
    pub fn new() -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} | {elapsed_precise} elapsed, ETA {eta_precise}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░ "),
        );
        if !atty::is(atty::Stream::Stderr) {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { pb }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn set_total(&self, total_bytes: u64) {
        self.pb.set_length(total_bytes);
    }

    fn add(&self, bytes_written: u64) -> u64 {
        self.pb.inc(bytes_written);
        self.pb.position()
    }

    fn start(&self) {
        self.pb.reset_elapsed();
    }

    fn finish(&self) {
        self.pb.finish();
    }
}

/// Progress sink that only keeps count.
#[derive(Debug, Default)]
pub struct SilentProgress {
    total: AtomicU64,
    written: AtomicU64,
}

impl SilentProgress {
    /// Bytes recorded so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Total announced by the downloader.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ProgressSink for SilentProgress {
    fn set_total(&self, total_bytes: u64) {
        self.total.store(total_bytes, Ordering::Relaxed);
    }

    fn add(&self, bytes_written: u64) -> u64 {
        self.written.fetch_add(bytes_written, Ordering::Relaxed) + bytes_written
    }

    fn start(&self) {}

    fn finish(&self) {}
}
