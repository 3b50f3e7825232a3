use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::AppResult;

/// Drive a paginated step function until it reports completion.
///
/// `step(cursor)` processes one page and returns the next cursor: 0 means no
/// more work, any other value is the inclusive lower bound for the next call.
/// An error aborts the drain; in-flight cursor state is discarded and the
/// next scheduled invocation starts over from 0. That rescan is safe because
/// every step's mutating predicate excludes rows already in the target state.
pub async fn run_batch<F, Fut>(mut step: F) -> AppResult<()>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = AppResult<i64>>,
{
    let mut cursor = 0;
    loop {
        let next = step(cursor).await?;
        if next == 0 {
            return Ok(());
        }
        cursor = next;
    }
}

/// Split a probe page into the ids to process and the next cursor.
///
/// Steps request `batch_size + 1` rows: when the page fits in `batch_size`
/// the scan is complete (cursor 0); otherwise the extra row is dropped from
/// the processed set and its id becomes the next cursor. The probe row is
/// re-read on the next call, where processing it again is a no-op.
pub fn page_cursor(mut ids: Vec<i64>, batch_size: usize) -> (Vec<i64>, i64) {
    if ids.len() <= batch_size {
        return (ids, 0);
    }
    let next = ids[batch_size];
    ids.truncate(batch_size);
    (ids, next)
}

/// Single-process reentrancy flag for a named job.
///
/// A trigger that fails to acquire the permit is skipped entirely; nothing
/// queues. This does not coordinate across service instances: multi-instance
/// deployments need an external advisory lock instead.
#[derive(Clone)]
pub struct JobGuard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    name: &'static str,
    running: AtomicBool,
}

impl JobGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                name,
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Claim the job slot; `None` when the previous run is still going.
    pub fn try_acquire(&self) -> Option<JobPermit> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
            .then(|| JobPermit {
                inner: Arc::clone(&self.inner),
            })
    }
}

/// Releases the job slot on drop.
pub struct JobPermit {
    inner: Arc<GuardInner>,
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
    }
}
