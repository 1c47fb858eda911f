//! Bounded concurrent fan-out over per-symbol work, plus run progress
//! tracking.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Tuning knobs shared by every network-bound pipeline stage.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum in-flight API requests.
    pub concurrency: usize,
    /// Pause before each request, inside the concurrency permit.
    pub request_delay: Duration,
    /// Symbols processed per batch before caches are flushed.
    pub batch_size: usize,
    /// Checkpoint caches every N completed symbols within a batch.
    pub checkpoint_every: u64,
    /// Log a progress line every N completed symbols.
    pub progress_every: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            request_delay: Duration::from_millis(200),
            batch_size: 2000,
            checkpoint_every: 100,
            progress_every: 50,
        }
    }
}

/// Completion counter that logs throughput and a remaining-time estimate.
pub struct Progress {
    start: Instant,
    total: usize,
    every: u64,
    count: AtomicU64,
}

impl Progress {
    pub fn new(total: usize, every: u64) -> Self {
        Self {
            start: Instant::now(),
            total,
            every: every.max(1),
            count: AtomicU64::new(0),
        }
    }

    /// Records one completion and returns the running total.
    pub fn tick(&self) -> u64 {
        let done = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.every == 0 {
            let elapsed = self.start.elapsed().as_secs_f64().max(0.001);
            let rate = done as f64 / elapsed;
            let remaining = (self.total as u64).saturating_sub(done) as f64;
            let eta_min = remaining / rate.max(0.001) / 60.0;
            info!(
                "progress: {}/{} ({:.1}/s, ~{:.1} min remaining)",
                done, self.total, rate, eta_min
            );
        }
        done
    }

    pub fn done(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Runs `work` over `items` with at most `concurrency` in flight, feeding
/// each result to `on_complete` as it lands. Completion order is not the
/// submission order.
pub async fn fan_out_with<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    work: F,
    mut on_complete: impl FnMut(R),
) where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let work = Arc::new(work);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for item in items {
        let work = Arc::clone(&work);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore closed");
            work(item).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => on_complete(result),
            Err(e) => error!("worker task panicked: {e}"),
        }
    }
}

/// Convenience wrapper collecting all results into a `Vec`.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, concurrency: usize, work: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let mut out = Vec::new();
    fan_out_with(items, concurrency, work, |r| out.push(r)).await;
    out
}
