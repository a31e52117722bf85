//! Rayon thread pool configuration for search workloads.
//!
//! [WorkerPool::install] runs a search with a fixed number of threads, or on
//! Rayon's global pool (all CPU cores) when no count is set.

use rayon::ThreadPoolBuilder;
use tracing::warn;

/// How many worker threads evaluate candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPool {
    /// Number of worker threads. 0 means the Rayon default (one per core).
    pub workers: usize,
}

impl WorkerPool {
    pub fn with_workers(n: usize) -> Self {
        Self { workers: n }
    }

    /// Threads a search running under this pool will use.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            rayon::current_num_threads()
        } else {
            self.workers
        }
    }

    /// Run `f` on a pool with this worker count. With 0 workers, or if the dedicated pool
    /// cannot be built, `f` runs on the global Rayon pool.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.workers == 0 {
            return f();
        }
        match ThreadPoolBuilder::new().num_threads(self.workers).build() {
            Ok(pool) => pool.install(f),
            Err(err) => {
                warn!(workers = self.workers, error = %err, "falling back to global rayon pool");
                f()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedicated_pool_uses_requested_threads() {
        let pool = WorkerPool::with_workers(2);
        assert_eq!(pool.install(rayon::current_num_threads), 2);
        assert_eq!(pool.effective_workers(), 2);
    }

    #[test]
    fn default_pool_runs_on_global_threads() {
        let pool = WorkerPool::default();
        assert_eq!(pool.install(|| 7), 7);
        assert_eq!(pool.effective_workers(), rayon::current_num_threads());
    }
}
