//! Worker pools for distributing computation.
//!
//! The greedy search in [`algo::ei`](crate::algo::ei) and the snapshot sweep
//! in [`interpolation`](crate::interpolation) can distribute their work over
//! a [`WorkerPool`]. Each worker owns private state (for example a shard of
//! the snapshot set); the coordinator drives rounds of computation and only
//! scalars or single vectors cross the pool boundary per round.
//!
//! Two implementations are provided: [`SequentialPool`], a trivial pool of
//! one that runs everything in the calling thread, and [`RayonPool`], which
//! executes rounds on a rayon thread pool. Algorithms never special-case the
//! pool implementation; callers pick one explicitly.
//!
//! Per-worker state lives in a [`WorkerLocal`] owned by the coordinator.
//! Dropping the `WorkerLocal` releases all worker-side storage, also when a
//! round ends early, so distributed objects never outlive the scope that
//! created them.

use rayon::prelude::*;

use crate::core::VectorArray;

/// Private per-worker state, one entry per worker of the pool that created
/// it.
///
/// Every entry is exclusively owned by "its" worker for the duration of a
/// [`WorkerPool::apply`] round; between rounds the collection as a whole is
/// owned by the coordinator. Dropping the value releases all entries.
#[derive(Debug)]
pub struct WorkerLocal<S>(Vec<S>);

impl<S> WorkerLocal<S> {
    /// Number of per-worker entries.
    pub fn num_workers(&self) -> usize {
        self.0.len()
    }

    /// Access the state of a single worker.
    pub fn get(&self, worker: usize) -> &S {
        &self.0[worker]
    }

    /// Transform every per-worker entry, keeping the worker association.
    pub fn map<T>(self, f: impl FnMut(S) -> T) -> WorkerLocal<T> {
        WorkerLocal(self.0.into_iter().map(f).collect())
    }

    /// Consume the collection, returning the raw per-worker entries.
    pub fn into_inner(self) -> Vec<S> {
        self.0
    }
}

/// Capability for distributing computation across a set of workers.
///
/// The coordinator blocks on every round trip; a round is a hard
/// synchronization barrier and there is no overlap between rounds. Failures
/// inside the dispatched closures are ordinary values (`Result` items in the
/// gathered output); callers abort on the first error instead of masking
/// partial worker failure.
pub trait WorkerPool {
    /// Number of workers in the pool.
    fn num_workers(&self) -> usize;

    /// Evaluate `f` on every item, distributing the work across the pool and
    /// gathering the results in input order.
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync;

    /// Run `f` on every worker's private state, gathering one result per
    /// worker in worker order.
    fn apply<S, R, F>(&self, states: &mut WorkerLocal<S>, f: F) -> Vec<R>
    where
        S: Send,
        R: Send,
        F: Fn(&mut S) -> R + Send + Sync;

    /// Run `f` on the private state of a single worker.
    fn apply_only<S, R, F>(&self, states: &mut WorkerLocal<S>, worker: usize, f: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        f(&mut states.0[worker])
    }

    /// Build one private state per worker.
    fn push<S, F>(&self, init: F) -> WorkerLocal<S>
    where
        F: Fn(usize) -> S,
    {
        WorkerLocal((0..self.num_workers()).map(init).collect())
    }

    /// Split the vectors of `u` into one contiguous shard per worker.
    ///
    /// Shards follow the order of `u`, so a per-shard reduction that prefers
    /// earlier workers on ties reproduces the result of the same reduction
    /// over the undistributed array.
    fn scatter<A: VectorArray>(&self, u: &A) -> WorkerLocal<A> {
        let workers = self.num_workers().max(1);
        let base = u.len() / workers;
        let remainder = u.len() % workers;

        let mut shards = Vec::with_capacity(workers);
        let mut start = 0;
        for worker in 0..workers {
            let size = base + usize::from(worker < remainder);
            shards.push(u.slice(start..start + size));
            start += size;
        }
        WorkerLocal(shards)
    }
}

/// The trivial pool of one: everything runs sequentially in the calling
/// thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialPool;

impl WorkerPool for SequentialPool {
    fn num_workers(&self) -> usize {
        1
    }

    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        items.into_iter().map(f).collect()
    }

    fn apply<S, R, F>(&self, states: &mut WorkerLocal<S>, f: F) -> Vec<R>
    where
        S: Send,
        R: Send,
        F: Fn(&mut S) -> R + Send + Sync,
    {
        states.0.iter_mut().map(f).collect()
    }
}

/// A pool executing rounds on a rayon thread pool.
///
/// By default the global rayon pool is used; [`with_workers`](Self::with_workers)
/// builds a dedicated pool of the given size.
#[derive(Debug, Default)]
pub struct RayonPool {
    pool: Option<rayon::ThreadPool>,
}

impl RayonPool {
    /// Create a pool backed by the global rayon thread pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Create a pool with a dedicated rayon thread pool of `workers` threads.
    pub fn with_workers(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
        Ok(Self { pool: Some(pool) })
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl WorkerPool for RayonPool {
    fn num_workers(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        self.install(|| items.into_par_iter().map(f).collect())
    }

    fn apply<S, R, F>(&self, states: &mut WorkerLocal<S>, f: F) -> Vec<R>
    where
        S: Send,
        R: Send,
        F: Fn(&mut S) -> R + Send + Sync,
    {
        self.install(|| states.0.par_iter_mut().map(f).collect())
    }
}
