//! Optional parallel executor.
//!
//! Every parallel section in colorio is a map over `0..count` followed by a
//! join in index order. [`run_on_pool`] runs it on a [`ThreadPool`] when one
//! is given and sequentially otherwise; both paths return identical results.
//!
//! # Example
//!
//! ```rust
//! use colorio_core::pool::{run_on_pool, ThreadPool};
//!
//! let pool = ThreadPool::new(2).unwrap();
//! let squares = run_on_pool(Some(&pool), 4, || (), |_, i| i * i);
//! assert_eq!(squares, vec![0, 1, 4, 9]);
//! assert_eq!(run_on_pool(None, 4, || (), |_, i| i * i), squares);
//! ```

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Handle to a rayon worker pool.
#[derive(Debug)]
pub struct ThreadPool {
    inner: rayon::ThreadPool,
}

impl ThreadPool {
    /// Pool with `num_threads` workers (0 lets rayon choose).
    pub fn new(num_threads: usize) -> Result<Self> {
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|idx| format!("colorio-{idx}"))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        tracing::debug!(threads = inner.current_num_threads(), "thread pool ready");
        Ok(Self { inner })
    }

    /// Number of workers.
    pub fn num_threads(&self) -> usize {
        self.inner.current_num_threads()
    }
}

/// Maps `op` over `0..count` and returns the results in index order.
///
/// `init` builds per-worker state (for example a color transform, which is
/// not shareable between threads). It runs at least once per worker on the
/// pool and exactly once on the sequential path.
pub fn run_on_pool<T, R, I, F>(pool: Option<&ThreadPool>, count: usize, init: I, op: F) -> Vec<R>
where
    I: Fn() -> T + Sync + Send,
    F: Fn(&mut T, usize) -> R + Sync + Send,
    R: Send,
{
    match pool {
        Some(pool) => pool.inner.install(|| {
            (0..count)
                .into_par_iter()
                .map_init(&init, |state, i| op(state, i))
                .collect()
        }),
        None => {
            let mut state = init();
            (0..count).map(|i| op(&mut state, i)).collect()
        }
    }
}
