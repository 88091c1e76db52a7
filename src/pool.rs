//! Batch worker pool.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::sort::SortError;

/// Bounded worker pool executing tasks in join-all batches.
///
/// At most `max_workers` tasks run at the same time. A batch is fully joined before the next one is started,
/// which bounds the number of simultaneously open files and in-flight buffers to `max_workers`.
pub struct WorkerPool {
    thread_pool: rayon::ThreadPool,
    max_workers: usize,
}

impl WorkerPool {
    /// Creates a pool with `max_workers` threads.
    pub fn new(max_workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        log::info!("initializing thread-pool (threads: {})", max_workers);

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|idx| format!("bin-ext-sort-{}", idx))
            .build()?;

        return Ok(WorkerPool {
            thread_pool,
            max_workers,
        });
    }

    /// Maximum number of concurrently running tasks.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Runs a single batch of at most `max_workers` tasks and waits for every one of them.
    /// A failing or panicking task does not preempt its siblings. Results are returned in task order.
    pub fn run_batch<R, F>(&self, tasks: Vec<F>) -> Vec<Result<R, SortError>>
    where
        R: Send,
        F: FnOnce() -> Result<R, SortError> + Send,
    {
        assert!(
            tasks.len() <= self.max_workers,
            "batch of {} tasks exceeds the worker limit {}",
            tasks.len(),
            self.max_workers
        );

        let mut slots: Vec<Option<Result<R, SortError>>> = (0..tasks.len()).map(|_| None).collect();

        self.thread_pool.scope(|scope| {
            for (slot, task) in slots.iter_mut().zip(tasks) {
                scope.spawn(move |_| {
                    *slot = Some(match panic::catch_unwind(AssertUnwindSafe(task)) {
                        Ok(result) => result,
                        Err(payload) => Err(SortError::Unknown(panic_message(payload))),
                    });
                });
            }
        });

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(SortError::Unknown("task was not completed".to_string()))))
            .collect()
    }

    /// Runs tasks in consecutive batches of `max_workers`.
    /// Stops after the first batch containing a failed task and returns its first error.
    pub fn run_batches<R, F, I>(&self, tasks: I) -> Result<Vec<R>, SortError>
    where
        R: Send,
        F: FnOnce() -> Result<R, SortError> + Send,
        I: IntoIterator<Item = F>,
    {
        let mut tasks = tasks.into_iter().peekable();
        let mut output = Vec::new();

        while tasks.peek().is_some() {
            let batch: Vec<F> = tasks.by_ref().take(self.max_workers).collect();
            log::debug!("dispatching batch of {} tasks", batch.len());

            output.extend(collect_batch(self.run_batch(batch))?);
        }

        return Ok(output);
    }
}

/// Collects results of a joined batch, returning the first error if any task failed.
pub fn collect_batch<R>(results: Vec<Result<R, SortError>>) -> Result<Vec<R>, SortError> {
    let mut output = Vec::with_capacity(results.len());
    let mut failure = None;

    for result in results {
        match result {
            Ok(value) => output.push(value),
            Err(err) if failure.is_none() => failure = Some(err),
            Err(err) => log::warn!("additional task failure in batch: {}", err),
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(output),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", msg)
    } else {
        "task panicked".to_string()
    }
}
