//! Sequential and worker-pool execution strategies

use segelm_core::{Error, Result};
use std::ops::Range;

/// How independent work items are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Single-threaded processing, in index order
    Sequential,
    /// Fixed-size worker pool with the given number of workers
    Pool(usize),
}

impl Default for ProcessingMode {
    fn default() -> Self {
        ProcessingMode::Sequential
    }
}

impl ProcessingMode {
    /// Select a mode from a `processes` count: 1 is sequential, more is a pool.
    pub fn from_processes(processes: usize) -> Result<Self> {
        match processes {
            0 => Err(Error::invalid_parameter(
                "processes",
                processes,
                "must be at least 1",
            )),
            1 => Ok(ProcessingMode::Sequential),
            n => Ok(ProcessingMode::Pool(n)),
        }
    }

    /// Number of workers this mode runs with
    pub fn workers(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Pool(n) => *n,
        }
    }
}

/// Strategy for mapping a fallible function over work-item indices.
///
/// Results always come back in index order, whatever order the items
/// complete in. The first error fails the whole map.
pub trait ParallelStrategy {
    /// Map `f` over `range` and collect the results in index order
    fn try_map<T, F>(&self, range: Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        self.try_map_with_progress(range, f, |_, _| {})
    }

    /// Like [`try_map`](Self::try_map), reporting `(completed, total)` after each item.
    ///
    /// Progress is reported only when items run sequentially.
    fn try_map_with_progress<T, F, P>(&self, range: Range<usize>, f: F, progress: P) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
        P: FnMut(usize, usize);
}

impl ParallelStrategy for ProcessingMode {
    fn try_map_with_progress<T, F, P>(&self, range: Range<usize>, f: F, mut progress: P) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
        P: FnMut(usize, usize),
    {
        match self {
            ProcessingMode::Sequential => {
                let total = range.len();
                let mut results = Vec::with_capacity(total);
                for (done, i) in range.enumerate() {
                    results.push(f(i)?);
                    progress(done + 1, total);
                }
                Ok(results)
            }
            ProcessingMode::Pool(workers) => pool_map(*workers, range, f),
        }
    }
}

#[cfg(feature = "parallel")]
fn pool_map<T, F>(workers: usize, range: Range<usize>, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync + Send,
{
    use rayon::prelude::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("segelm-worker-{i}"))
        .build()
        .map_err(|e| Error::Worker(format!("failed to build worker pool: {e}")))?;

    tracing::debug!(workers, items = range.len(), "dispatching to worker pool");

    // A panicking worker fails the run instead of unwinding through the caller.
    catch_unwind(AssertUnwindSafe(|| {
        pool.install(|| range.into_par_iter().map(&f).collect::<Result<Vec<T>>>())
    }))
    .map_err(|payload| Error::Worker(panic_message(payload.as_ref())))?
}

#[cfg(not(feature = "parallel"))]
fn pool_map<T, F>(workers: usize, range: Range<usize>, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync + Send,
{
    tracing::debug!(workers, "built without `parallel`, running pool sequentially");
    range.map(f).collect()
}

#[cfg(feature = "parallel")]
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}
