//! # batch-fetch Download Library
//!
//! `batch-fetch` downloads a list of URLs concurrently into a directory.
//! It supports features like:
//! - A fixed-size pool of workers pulling URLs from a shared queue
//! - Per-URL progress tracking behind a single registry
//! - Periodic throughput reports for every in-flight transfer
//! - Per-URL failure isolation: one bad URL never stops the others
//!
//! ## Example Usage
//!
//! ```no_run
//! use batch_fetch::{LogObserver, PoolOptions, WorkerPool};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let observer = Arc::new(LogObserver::new(tracing::info_span!("batch")));
//! let pool = WorkerPool::new(reqwest::Client::new(), "./output", PoolOptions::default(), observer);
//! let report = pool
//!     .run(vec!["https://example.com/a.bin".to_string()])
//!     .await;
//! println!("{} ok, {} failed", report.succeeded, report.failed);
//! # }
//! ```

pub mod args;
pub mod config;
pub mod monitor;
pub mod observer;
pub mod pool;
pub mod state;
pub mod utils;
pub mod worker;

pub use args::Args;
pub use monitor::RateMonitor;
pub use observer::{LogObserver, TransferObserver};
pub use pool::{PoolOptions, PoolReport, WorkerPool};
pub use state::{ByteCounter, ProgressRegistry, TransferState};
pub use worker::{TransferError, TransferSummary, download_url};
