//! Periodic throughput reporting for one in-flight transfer.
use crate::observer::TransferObserver;
use crate::state::ProgressRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// How often a running transfer reports its rate.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to a background task sampling [`ProgressRegistry::rate`] for one URL.
///
/// The first sample is taken one full interval after spawning. Calling
/// [`RateMonitor::stop`] consumes the handle, so a monitor can only be stopped
/// once; dropping it without stopping still cancels the task.
pub struct RateMonitor {
    url: String,
    worker: usize,
    observer: Arc<dyn TransferObserver>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RateMonitor {
    pub fn spawn(
        url: String,
        worker: usize,
        registry: Arc<ProgressRegistry>,
        observer: Arc<dyn TransferObserver>,
        every: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let task_url = url.clone();
        let task_observer = observer.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        task_observer.rate_sample(worker, &task_url, registry.rate(&task_url));
                    }
                }
            }
        });

        Self {
            url,
            worker,
            observer,
            token,
            handle,
        }
    }

    /// Cancels the monitor and waits for its task to exit.
    ///
    /// Once this returns no further samples are reported.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.handle).await
            && e.is_panic()
        {
            self.observer
                .task_panicked(self.worker, Some(&self.url), &e.to_string());
        }
    }
}

impl Drop for RateMonitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::testing::{Event, RecordingObserver};
    use tokio::time::sleep;

    const URL: &str = "https://example.com/a.bin";

    fn spawn_monitor(
        registry: &Arc<ProgressRegistry>,
        observer: &Arc<RecordingObserver>,
    ) -> RateMonitor {
        RateMonitor::spawn(
            URL.to_string(),
            0,
            registry.clone(),
            observer.clone(),
            SAMPLE_INTERVAL,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_once_per_interval() {
        let registry = Arc::new(ProgressRegistry::new());
        let observer = Arc::new(RecordingObserver::default());
        registry.record_bytes(URL, 1024);

        let monitor = spawn_monitor(&registry, &observer);

        sleep(Duration::from_secs(4)).await;
        assert_eq!(observer.samples(), 0);

        sleep(Duration::from_secs(7)).await;
        assert_eq!(observer.samples(), 2);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_samples_after_stop() {
        let registry = Arc::new(ProgressRegistry::new());
        let observer = Arc::new(RecordingObserver::default());

        let monitor = spawn_monitor(&registry, &observer);
        sleep(Duration::from_secs(6)).await;
        assert_eq!(observer.samples(), 1);

        monitor.stop().await;
        sleep(Duration::from_secs(60)).await;
        assert_eq!(observer.samples(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick_is_silent() {
        let registry = Arc::new(ProgressRegistry::new());
        let observer = Arc::new(RecordingObserver::default());

        let monitor = spawn_monitor(&registry, &observer);
        monitor.stop().await;

        sleep(Duration::from_secs(30)).await;
        assert!(observer.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let registry = Arc::new(ProgressRegistry::new());
        let observer = Arc::new(RecordingObserver::default());

        drop(spawn_monitor(&registry, &observer));

        sleep(Duration::from_secs(30)).await;
        assert_eq!(observer.samples(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_sampler_is_reported_on_stop() {
        let registry = Arc::new(ProgressRegistry::new());
        let observer = Arc::new(RecordingObserver::panicking_on("a.bin"));

        let monitor = spawn_monitor(&registry, &observer);
        sleep(Duration::from_secs(6)).await;
        monitor.stop().await;

        assert_eq!(
            observer.events(),
            vec![Event::Sample(URL.to_string()), Event::Panicked(Some(URL.to_string()))]
        );
    }
}
