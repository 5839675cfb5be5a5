//! Fixed-size worker pool draining a shared URL queue.
use crate::monitor::{RateMonitor, SAMPLE_INTERVAL};
use crate::observer::TransferObserver;
use crate::state::ProgressRegistry;
use crate::worker::download_url;
use futures_util::FutureExt;
use futures_util::future::join_all;
use reqwest::Client;
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Number of transfers allowed in flight at once.
    pub workers: NonZeroUsize,
    /// How often each transfer reports its rate.
    pub sample_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            sample_interval: SAMPLE_INTERVAL,
        }
    }
}

/// Per-URL outcome counts for one [`WorkerPool::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl PoolReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

struct Shared {
    client: Client,
    out_dir: PathBuf,
    registry: Arc<ProgressRegistry>,
    observer: Arc<dyn TransferObserver>,
    sample_interval: Duration,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

/// Downloads a list of URLs with at most `workers` transfers in flight.
pub struct WorkerPool {
    client: Client,
    out_dir: PathBuf,
    options: PoolOptions,
    registry: Arc<ProgressRegistry>,
    observer: Arc<dyn TransferObserver>,
}

impl WorkerPool {
    pub fn new(
        client: Client,
        out_dir: impl Into<PathBuf>,
        options: PoolOptions,
        observer: Arc<dyn TransferObserver>,
    ) -> Self {
        Self {
            client,
            out_dir: out_dir.into(),
            options,
            registry: Arc::new(ProgressRegistry::new()),
            observer,
        }
    }

    /// Progress of every transfer this pool has started.
    pub fn registry(&self) -> Arc<ProgressRegistry> {
        self.registry.clone()
    }

    /// Queues every URL once and blocks until all workers have drained the queue.
    ///
    /// A failing or panicking URL is reported to the observer and counted as
    /// failed; it never stops the other workers.
    pub async fn run(&self, urls: Vec<String>) -> PoolReport {
        let (tx, rx) = mpsc::unbounded_channel();
        for url in urls {
            // The receiver is alive until the end of this function.
            let _ = tx.send(url);
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let shared = Arc::new(Shared {
            client: self.client.clone(),
            out_dir: self.out_dir.clone(),
            registry: self.registry.clone(),
            observer: self.observer.clone(),
            sample_interval: self.options.sample_interval,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });

        let tasks: Vec<_> = (0..self.options.workers.get())
            .map(|worker| {
                let queue = queue.clone();
                let shared = shared.clone();
                tokio::spawn(async move { worker_loop(worker, queue, shared).await })
            })
            .collect();

        for (worker, result) in join_all(tasks).await.into_iter().enumerate() {
            if let Err(e) = result {
                self.observer.task_panicked(worker, None, &e.to_string());
            }
        }

        let report = PoolReport {
            succeeded: shared.succeeded.load(Ordering::SeqCst),
            failed: shared.failed.load(Ordering::SeqCst),
        };
        self.observer.pool_finished(&report);
        report
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    shared: Arc<Shared>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(url) = next else {
            break;
        };

        // A panic costs this URL only; the worker keeps draining the queue.
        match AssertUnwindSafe(process_url(worker, &url, &shared))
            .catch_unwind()
            .await
        {
            Ok(true) => {
                shared.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            Ok(false) => {
                shared.failed.fetch_add(1, Ordering::SeqCst);
            }
            Err(payload) => {
                shared.failed.fetch_add(1, Ordering::SeqCst);
                shared
                    .observer
                    .task_panicked(worker, Some(&url), &panic_message(payload.as_ref()));
            }
        }
    }
}

/// Runs one transfer with its rate monitor. Returns whether it succeeded.
async fn process_url(worker: usize, url: &str, shared: &Shared) -> bool {
    shared.observer.transfer_started(worker, url);
    let monitor = RateMonitor::spawn(
        url.to_string(),
        worker,
        shared.registry.clone(),
        shared.observer.clone(),
        shared.sample_interval,
    );

    let result = download_url(&shared.client, url, &shared.out_dir, &shared.registry).await;
    monitor.stop().await;

    match result {
        Ok(summary) => {
            shared.observer.transfer_finished(worker, &summary);
            true
        }
        Err(e) => {
            shared.observer.transfer_failed(worker, url, &e);
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::{Event, RecordingObserver};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pool(dir: &std::path::Path, workers: usize, observer: &Arc<RecordingObserver>) -> WorkerPool {
        WorkerPool::new(
            Client::new(),
            dir,
            PoolOptions {
                workers: NonZeroUsize::new(workers).unwrap(),
                ..PoolOptions::default()
            },
            observer.clone(),
        )
    }

    #[tokio::test]
    async fn test_empty_queue_returns_immediately() {
        let dir = tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::default());

        let report = pool(dir.path(), 3, &observer).run(Vec::new()).await;

        assert_eq!(report, PoolReport::default());
        assert_eq!(observer.events(), vec![Event::PoolFinished(0, 0)]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_url() {
        let mock_server = MockServer::start().await;
        for name in ["one.txt", "two.txt", "three.txt"] {
            Mock::given(method("GET"))
                .and(path(format!("/{}", name)))
                .respond_with(ResponseTemplate::new(200).set_body_string(name))
                .mount(&mock_server)
                .await;
        }

        let uri = mock_server.uri();
        let urls = vec![
            format!("{}/one.txt", uri),
            format!("{}/missing", uri),
            format!("{}/two.txt", uri),
            format!("{}/gone", uri),
            format!("{}/three.txt", uri),
        ];

        let dir = tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let pool = pool(dir.path(), 1, &observer);

        let report = pool.run(urls.clone()).await;

        assert_eq!(report, PoolReport { succeeded: 3, failed: 2 });
        assert_eq!(report.total(), urls.len());
        for name in ["one.txt", "two.txt", "three.txt"] {
            let content = tokio::fs::read_to_string(dir.path().join(name)).await.unwrap();
            assert_eq!(content, name);
        }
        assert!(!dir.path().join("missing").exists());

        // A single worker processes the queue strictly in order
        let events = observer.events();
        let started: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Started(url) => Some(url.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(started, urls);
        assert!(events.contains(&Event::Failed(urls[1].clone(), "status")));
        assert_eq!(events.last(), Some(&Event::PoolFinished(3, 2)));
        assert_eq!(pool.registry().len(), 3);
    }

    #[tokio::test]
    async fn test_more_workers_than_urls() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 4096]))
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let urls = vec![
            format!("{}/a.bin", mock_server.uri()),
            format!("{}/b.bin", mock_server.uri()),
        ];

        let report = pool(dir.path(), 8, &observer).run(urls).await;

        assert_eq!(report.succeeded, 2);
        for name in ["a.bin", "b.bin"] {
            let meta = tokio::fs::metadata(dir.path().join(name)).await.unwrap();
            assert_eq!(meta.len(), 4096);
        }
    }

    #[tokio::test]
    async fn test_panicking_transfer_is_counted_and_worker_survives() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let uri = mock_server.uri();
        let urls = vec![
            format!("{}/first.txt", uri),
            format!("{}/boom.txt", uri),
            format!("{}/last.txt", uri),
        ];

        let dir = tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::panicking_on("boom"));

        // One worker, so the URL after the panic proves the worker kept going
        let report = pool(dir.path(), 1, &observer).run(urls.clone()).await;

        assert_eq!(report, PoolReport { succeeded: 2, failed: 1 });
        assert_eq!(report.total(), urls.len());
        assert!(dir.path().join("first.txt").exists());
        assert!(dir.path().join("last.txt").exists());
        assert!(!dir.path().join("boom.txt").exists());

        let events = observer.events();
        assert!(events.contains(&Event::Panicked(Some(urls[1].clone()))));
        assert!(events.contains(&Event::Finished(urls[2].clone())));
        assert_eq!(events.last(), Some(&Event::PoolFinished(2, 1)));
    }
}
