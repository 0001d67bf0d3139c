//! Bounded worker pool for external-tool jobs.
//!
//! A [`WorkerPool`] caps how many of its jobs run at once. Each job is a
//! tokio task that typically supervises one ffmpeg child process, so the
//! real parallelism is OS processes; the task only waits on it.
//!
//! Pools do not know about each other. A job running inside one pool may
//! build a second pool, submit work to it and block on the result, which is
//! how a batch run (outer pool, one job per source file) drives each file's
//! audio and segment encodes (inner pool) without deadlocking.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use sg_core::config::TranscodeConfig;
use sg_core::{Error, Result};

/// A fixed-size pool of job slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool running at most `size` jobs at once (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Pool sized from the transcode settings (`ceil(cpus / divisor)` unless
    /// an explicit worker count is configured).
    pub fn for_parallelism(config: &TranscodeConfig) -> Self {
        Self::new(config.parallelism())
    }

    /// Maximum number of concurrently running jobs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Dispatch `job` without waiting for it.
    ///
    /// The job starts as soon as a slot is free. Await the result with
    /// [`PoolHandle::join`]; dropping the handle aborts the job.
    pub fn spawn<F, T>(&self, job: F) -> PoolHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permits = self.permits.clone();
        let handle = tokio::spawn(async move {
            let _permit = acquire(&permits).await?;
            job.await
        });
        PoolHandle {
            handle: Some(handle),
            finished: None,
        }
    }

    /// Run `job` over every item, at most [`size`](Self::size) at a time,
    /// and return the results in input order.
    ///
    /// Fails fast: the first error aborts the remaining jobs, waits for them
    /// to wind down (killing their child processes) and is returned.
    pub async fn map<I, F, Fut, T>(&self, items: I, job: F) -> Result<Vec<T>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let jobs: Vec<Fut> = items.into_iter().map(job).collect();
        let count = jobs.len();

        let mut set = JoinSet::new();
        for (index, job) in jobs.into_iter().enumerate() {
            let permits = self.permits.clone();
            set.spawn(async move {
                let _permit = acquire(&permits).await?;
                job.await.map(|value| (index, value))
            });
        }

        let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(join_error).and_then(|r| r);
            match outcome {
                Ok((index, value)) => results[index] = Some(value),
                Err(e) => {
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    return Err(e);
                }
            }
        }

        results
            .into_iter()
            .map(|r| r.ok_or_else(|| Error::Internal("worker pool lost a job result".into())))
            .collect()
    }
}

/// Handle to a job dispatched with [`WorkerPool::spawn`].
#[derive(Debug)]
pub struct PoolHandle<T> {
    handle: Option<JoinHandle<Result<T>>>,
    /// Result of a job that succeeded while [`failure`](Self::failure) was
    /// watching it.
    finished: Option<T>,
}

impl<T> PoolHandle<T> {
    /// Wait for the job and return its result.
    pub async fn join(mut self) -> Result<T> {
        if let Some(value) = self.finished.take() {
            return Ok(value);
        }
        match self.handle.take() {
            Some(handle) => handle.await.map_err(join_error)?,
            None => Err(Error::Internal("pool handle already joined".into())),
        }
    }

    /// Abort the job and wait until it has stopped.
    pub async fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Resolve with the job's error as soon as it fails.
    ///
    /// Never resolves if the job succeeds; the value is kept for
    /// [`join`](Self::join). Dropping the future leaves the job running, so
    /// it can race other work in `select!`.
    pub async fn failure(&mut self) -> Error {
        if let Some(handle) = self.handle.as_mut() {
            let outcome = handle.await.map_err(join_error).and_then(|r| r);
            self.handle = None;
            match outcome {
                Ok(value) => self.finished = Some(value),
                Err(e) => return e,
            }
        }
        std::future::pending().await
    }

    /// Whether the job has completed.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl<T> Drop for PoolHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn acquire(permits: &Arc<Semaphore>) -> Result<tokio::sync::OwnedSemaphorePermit> {
    permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| Error::Internal("worker pool closed".into()))
}

fn join_error(e: JoinError) -> Error {
    if e.is_cancelled() {
        Error::pipeline("worker pool", "job aborted")
    } else {
        Error::Internal(format!("worker job panicked: {e}"))
    }
}
