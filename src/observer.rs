//! Progress and lifecycle reporting.
//!
//! The download core never writes to a global logger. Each component holds
//! an `Arc<dyn TransferObserver>` handed to it at construction time, and the
//! binary decides what an observer does with the events.
use crate::pool::PoolReport;
use crate::utils::format_bytes;
use crate::worker::{TransferError, TransferSummary};
use tracing::{Span, error, info};

/// Receives events from workers and rate monitors.
///
/// Implementations are called from several tasks at once.
pub trait TransferObserver: Send + Sync {
    /// A worker picked `url` off the queue.
    fn transfer_started(&self, worker: usize, url: &str);

    /// Periodic throughput sample for an in-flight transfer.
    fn rate_sample(&self, worker: usize, url: &str, bytes_per_sec: f64);

    fn transfer_finished(&self, worker: usize, summary: &TransferSummary);

    fn transfer_failed(&self, worker: usize, url: &str, error: &TransferError);

    /// A worker or rate monitor task panicked. `url` is the transfer it was
    /// handling, when known.
    fn task_panicked(&self, worker: usize, url: Option<&str>, message: &str);

    /// Every worker has drained the queue and exited.
    fn pool_finished(&self, report: &PoolReport);
}

/// Turns observer events into `tracing` events under a caller-supplied span.
#[derive(Debug, Clone)]
pub struct LogObserver {
    span: Span,
}

impl LogObserver {
    pub fn new(span: Span) -> Self {
        Self { span }
    }
}

impl TransferObserver for LogObserver {
    fn transfer_started(&self, worker: usize, url: &str) {
        info!(parent: &self.span, worker, url, "Downloading file from URL");
    }

    fn rate_sample(&self, worker: usize, url: &str, bytes_per_sec: f64) {
        let rate = format_bytes(bytes_per_sec.round() as u64);
        info!(
            parent: &self.span,
            worker,
            url,
            rate = %rate,
            "Current download rate for {} is {}/s",
            url,
            rate
        );
    }

    fn transfer_finished(&self, worker: usize, summary: &TransferSummary) {
        let elapsed = format!("{}s", summary.elapsed.as_secs());
        let size = format_bytes(summary.state.downloaded_bytes.max(0) as u64);
        info!(
            parent: &self.span,
            worker,
            url = %summary.url,
            path = %summary.path.display(),
            "Total download time for url {}: {}",
            summary.url,
            elapsed
        );
        info!(
            parent: &self.span,
            worker,
            url = %summary.url,
            "Total file size for url {}: {}",
            summary.url,
            size
        );
    }

    fn transfer_failed(&self, worker: usize, url: &str, err: &TransferError) {
        error!(
            parent: &self.span,
            worker,
            url,
            phase = err.phase(),
            "Error downloading file from URL: {}",
            err
        );
    }

    fn task_panicked(&self, worker: usize, url: Option<&str>, message: &str) {
        error!(
            parent: &self.span,
            worker,
            url = url.unwrap_or("-"),
            "Task panicked: {}",
            message
        );
    }

    fn pool_finished(&self, report: &PoolReport) {
        info!(
            parent: &self.span,
            succeeded = report.succeeded,
            failed = report.failed,
            "All workers finished"
        );
    }
}
