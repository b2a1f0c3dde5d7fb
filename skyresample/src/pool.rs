//! Parallelism settings and the scoped worker pool.
//!
//! The caller's parallelism request is validated once, at the boundary, into
//! [`Parallelism`]. A [`WorkerPool`] is then created for the duration of a
//! single reprojection call, reused for every loop index, and torn down when
//! it is dropped, on success, error and cancellation alike.
//!
//! ```text
//! Parallelism::Auto      -> available cores (fallback 4)
//! Parallelism::Disabled  -> coordinator thread only
//! Parallelism::Fixed(n)  -> n workers (n = 1 runs on the coordinator)
//! ```
//!
//! Worker threads are plain rayon threads. They never see the cancellation
//! token or any signal handler; only the coordinator decides when to abort.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{ReprojectError, ReprojectResult};
use crate::partition::InputWindow;

/// Worker count used when the number of cores cannot be determined.
pub const FALLBACK_WORKERS: usize = 4;

/// Requested degree of parallelism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// One worker per available core.
    #[default]
    Auto,
    /// Run everything on the calling thread.
    Disabled,
    /// Explicit worker count.
    Fixed(NonZeroUsize),
}

impl Parallelism {
    /// Maps a boolean flag: `true` is [`Auto`](Self::Auto), `false` is
    /// [`Disabled`](Self::Disabled).
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Parallelism::Auto
        } else {
            Parallelism::Disabled
        }
    }

    /// Explicit worker count.
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectError::InvalidWorkerCount`] for zero or negative
    /// counts.
    pub fn workers(count: i64) -> ReprojectResult<Self> {
        Self::try_from(count)
    }

    /// Number of workers this setting resolves to on the current machine.
    pub fn worker_count(&self) -> usize {
        match self {
            Parallelism::Auto => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(FALLBACK_WORKERS),
            Parallelism::Disabled => 1,
            Parallelism::Fixed(n) => n.get(),
        }
    }
}

impl TryFrom<i64> for Parallelism {
    type Error = ReprojectError;

    fn try_from(count: i64) -> Result<Self, Self::Error> {
        usize::try_from(count)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Parallelism::Fixed)
            .ok_or(ReprojectError::InvalidWorkerCount(count))
    }
}

impl From<NonZeroUsize> for Parallelism {
    fn from(count: NonZeroUsize) -> Self {
        Parallelism::Fixed(count)
    }
}

impl FromStr for Parallelism {
    type Err = ReprojectError;

    /// Accepts `auto`/`true`/`yes`/`on`, `false`/`no`/`off`/`serial`, or an
    /// integer worker count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "auto" | "true" | "yes" | "on" => Ok(Parallelism::Auto),
            "false" | "no" | "off" | "serial" => Ok(Parallelism::Disabled),
            _ => match value.parse::<i64>() {
                Ok(count) => Parallelism::try_from(count),
                Err(_) => Err(ReprojectError::InvalidParallelism(s.to_string())),
            },
        }
    }
}

impl fmt::Display for Parallelism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parallelism::Auto => f.write_str("auto"),
            Parallelism::Disabled => f.write_str("false"),
            Parallelism::Fixed(n) => write!(f, "{}", n),
        }
    }
}

enum Executor {
    Inline,
    Threads(ThreadPool),
}

/// Worker pool scoped to one reprojection call.
///
/// Dropping the pool joins and releases its threads.
pub struct WorkerPool {
    executor: Executor,
    workers: usize,
}

impl WorkerPool {
    /// Creates a pool for `parallelism`.
    ///
    /// A single resolved worker runs inline on the caller's thread without
    /// spawning anything.
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectError::PoolCreation`] if the threads cannot be
    /// spawned.
    pub fn new(parallelism: Parallelism) -> ReprojectResult<Self> {
        let workers = parallelism.worker_count();
        if workers <= 1 {
            return Ok(Self::inline());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("skyresample-worker-{}", i))
            .build()
            .map_err(|e| ReprojectError::PoolCreation {
                workers,
                reason: e.to_string(),
            })?;

        debug!(workers, "Worker pool started");
        Ok(Self {
            executor: Executor::Threads(pool),
            workers,
        })
    }

    /// Pool that runs every task on the calling thread.
    pub fn inline() -> Self {
        Self {
            executor: Executor::Inline,
            workers: 1,
        }
    }

    /// Number of partitions this pool expects per batch.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.executor, Executor::Inline)
    }

    /// Runs `task` once per window and returns the results in window order,
    /// regardless of completion order.
    pub fn run_batch<R, F>(&self, windows: &[InputWindow], task: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&InputWindow) -> R + Send + Sync,
    {
        match &self.executor {
            Executor::Inline => windows.iter().map(task).collect(),
            Executor::Threads(pool) => pool.install(|| windows.par_iter().map(&task).collect()),
        }
    }

    /// Runs `task` for every index in `0..count` and returns the results in
    /// index order.
    ///
    /// Threaded pools spread the indices over their own threads only; an
    /// inline pool runs them in order on the calling thread.
    pub fn map_indexed<R, F>(&self, count: usize, task: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync,
    {
        match &self.executor {
            Executor::Inline => (0..count).map(task).collect(),
            Executor::Threads(pool) => {
                pool.install(|| (0..count).into_par_iter().map(&task).collect())
            }
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("inline", &self.is_inline())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.is_inline() {
            debug!(workers = self.workers, "Worker pool shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::partition::{partition, PartitionAxis};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_flag_mapping() {
        assert_eq!(Parallelism::from_flag(true), Parallelism::Auto);
        assert_eq!(Parallelism::from_flag(false), Parallelism::Disabled);
        assert_eq!(Parallelism::default(), Parallelism::Auto);
    }

    #[test]
    fn test_non_positive_counts_rejected() {
        for count in [0, -3, i64::MIN] {
            let err = Parallelism::try_from(count).unwrap_err();
            assert!(matches!(err, ReprojectError::InvalidWorkerCount(c) if c == count));
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_positive_count() {
        let p = Parallelism::workers(4).unwrap();
        assert_eq!(p.worker_count(), 4);
        assert_eq!(p.to_string(), "4");
    }

    #[test]
    fn test_auto_resolves_to_at_least_one() {
        assert!(Parallelism::Auto.worker_count() >= 1);
        assert_eq!(Parallelism::Disabled.worker_count(), 1);
    }

    #[test]
    fn test_parse() {
        assert_eq!("auto".parse::<Parallelism>().unwrap(), Parallelism::Auto);
        assert_eq!("TRUE".parse::<Parallelism>().unwrap(), Parallelism::Auto);
        assert_eq!("false".parse::<Parallelism>().unwrap(), Parallelism::Disabled);
        assert_eq!("3".parse::<Parallelism>().unwrap().worker_count(), 3);
        assert!(matches!(
            "0".parse::<Parallelism>(),
            Err(ReprojectError::InvalidWorkerCount(0))
        ));
        assert!(matches!(
            "-3".parse::<Parallelism>(),
            Err(ReprojectError::InvalidWorkerCount(-3))
        ));
        assert!(matches!(
            "lots".parse::<Parallelism>(),
            Err(ReprojectError::InvalidParallelism(_))
        ));
    }

    #[test]
    fn test_single_worker_runs_inline() {
        let one = Parallelism::workers(1).unwrap();
        assert!(WorkerPool::new(one).unwrap().is_inline());
        assert!(WorkerPool::new(Parallelism::Disabled).unwrap().is_inline());
    }

    #[test]
    fn test_threaded_pool() {
        let pool = WorkerPool::new(Parallelism::workers(3).unwrap()).unwrap();
        assert!(!pool.is_inline());
        assert_eq!(pool.workers(), 3);
    }

    #[test]
    fn test_results_in_window_order() {
        let pool = WorkerPool::new(Parallelism::workers(4).unwrap()).unwrap();
        let windows = partition(1, 40, 4, PartitionAxis::Columns);

        // Earlier windows sleep longer so they finish last
        let starts = pool.run_batch(&windows, |w| {
            std::thread::sleep(Duration::from_millis((40 - w.cols.start) as u64));
            w.cols.start
        });
        assert_eq!(starts, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_map_indexed_inline_stays_on_caller() {
        let caller = std::thread::current().id();
        let ids = WorkerPool::inline().map_indexed(64, |_| std::thread::current().id());
        assert_eq!(ids.len(), 64);
        assert!(ids.iter().all(|id| *id == caller));
    }

    #[test]
    fn test_map_indexed_uses_pool_threads() {
        let pool = WorkerPool::new(Parallelism::workers(2).unwrap()).unwrap();
        let names = pool.map_indexed(200, |i| {
            std::thread::sleep(Duration::from_micros(50));
            (i, std::thread::current().name().map(str::to_owned))
        });

        assert!(names.iter().enumerate().all(|(i, (j, _))| i == *j));
        let distinct: std::collections::HashSet<_> =
            names.iter().map(|(_, name)| name.clone()).collect();
        assert!(distinct.len() <= 2);
        assert!(distinct
            .iter()
            .all(|name| name.as_deref().is_some_and(|n| n.starts_with("skyresample-worker-"))));
    }

    #[test]
    fn test_every_window_runs_once() {
        let pool = WorkerPool::new(Parallelism::workers(2).unwrap()).unwrap();
        let windows = partition(5, 17, 6, PartitionAxis::Columns);
        let calls = AtomicUsize::new(0);
        let sizes = pool.run_batch(&windows, |w| {
            calls.fetch_add(1, Ordering::SeqCst);
            w.pixel_count()
        });
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(sizes.iter().sum::<usize>(), 5 * 17);
    }
}
