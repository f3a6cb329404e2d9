//! Bounded fan-out over independent work items.
//!
//! A batch spawns at most `parallelism` tasks at a time: a permit from a
//! [`Semaphore`] is taken before each spawn and released when the task
//! ends. Every item's result is returned to the caller; only a panicking
//! task fails the batch as a whole.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Errors that abort a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A task panicked or was cancelled.
    #[error("batch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The permit semaphore was closed.
    #[error("worker pool closed")]
    Closed,
}

/// Workers per CPU core when parallelism is automatic.
const WORKERS_PER_CORE: usize = 4;

/// Concurrency for a batch of `items` items.
///
/// `configured == 0` means `cores x 4`; the result never exceeds the batch
/// size and is at least 1.
pub fn effective_parallelism(configured: usize, items: usize) -> usize {
    let bound = if configured == 0 {
        std::thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .saturating_mul(WORKERS_PER_CORE)
    } else {
        configured
    };
    bound.min(items).max(1)
}

/// Run `task` over every item with at most `parallelism` in flight.
///
/// Results come back in completion order, paired with their item.
///
/// # Errors
///
/// Returns [`PoolError::Task`] if any task panicked.
pub async fn run_batch<T, R, F, Fut>(
    items: Vec<T>,
    parallelism: usize,
    task: F,
) -> Result<Vec<(T, R)>, PoolError>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut set = JoinSet::new();
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|_closed| PoolError::Closed)?;
        let fut = task(item.clone());
        set.spawn(async move {
            let result = fut.await;
            drop(permit);
            (item, result)
        });
        while let Some(done) = set.try_join_next() {
            results.push(done?);
        }
    }
    while let Some(done) = set.join_next().await {
        results.push(done?);
    }
    Ok(results)
}
