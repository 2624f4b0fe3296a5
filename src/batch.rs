//! Batch Fan-out
//!
//! Splits a bulk write into contiguous chunks and runs each chunk on its own
//! connection in parallel.
//!
//! ## Partitioning
//! With `total` items and `n` workers every chunk holds `total / n` items
//! except the last, which also takes the remainder:
//!
//! ```text
//! 10 items, 3 workers:  [0..3] [3..6] [6..10]
//! ```
//!
//! ## Error Rule
//! Failures never interrupt anything: every worker runs its whole chunk and
//! the call returns only once all of them have finished. The error returned
//! is the one with the lowest item index.

use std::ops::Range;
use std::thread;

use crossbeam::channel;

use crate::error::{Result, SsdbError};
use crate::network::{dispatcher, Connection, Pool};
use crate::protocol::{Command, Response};

/// Items split into worker chunks
#[derive(Debug, Clone)]
pub struct BatchPlan<T> {
    items: Vec<T>,
    workers: usize,
}

impl<T> BatchPlan<T> {
    pub fn new(items: Vec<T>, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(SsdbError::Config("batch needs at least one worker".to_string()));
        }
        Ok(Self { items, workers })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Index range of each worker's chunk, in worker order
    pub fn chunk_ranges(&self) -> Vec<Range<usize>> {
        let total = self.items.len();
        let size = total / self.workers;
        (0..self.workers)
            .map(|worker| {
                let start = worker * size;
                let end = if worker + 1 == self.workers {
                    total
                } else {
                    start + size
                };
                start..end
            })
            .collect()
    }

    /// Move the items out as `(offset, chunk)` pairs, in worker order
    pub fn into_chunks(self) -> Vec<(usize, Vec<T>)> {
        let ranges = self.chunk_ranges();
        let mut rest = self.items.into_iter();
        ranges
            .into_iter()
            .map(|range| {
                let offset = range.start;
                let chunk: Vec<T> = rest.by_ref().take(range.len()).collect();
                (offset, chunk)
            })
            .collect()
    }
}

/// Runs a [`BatchPlan`] of commands across pooled connections
pub struct BatchCoordinator<'a> {
    pool: &'a Pool,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(pool: &'a Pool) -> Self {
        Self { pool }
    }

    /// Execute `commands` over `workers` connections and return one response
    /// per command, in command order
    ///
    /// `primary` serves as the first worker; the rest are acquired from the
    /// pool and discarded once every worker has finished. Responses with a
    /// status other than `ok`/`not_found` count as failures.
    pub fn multi_write(
        &self,
        primary: &Connection,
        commands: Vec<Command>,
        workers: usize,
    ) -> Result<Vec<Response>> {
        let plan = BatchPlan::new(commands, workers)?;
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        let total = plan.len();

        let mut extras = Vec::with_capacity(workers - 1);
        for _ in 1..workers {
            match self.pool.acquire() {
                Ok(conn) => extras.push(conn),
                Err(e) => {
                    self.discard_all(&extras);
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            "Multi-write of {} commands over {} workers: chunks {:?}",
            total,
            workers,
            plan.chunk_ranges()
        );

        let (tx, rx) = channel::unbounded::<(usize, Result<Response>)>();
        let connections: Vec<&Connection> =
            std::iter::once(primary).chain(extras.iter()).collect();

        let panicked = thread::scope(|scope| {
            let handles: Vec<_> = plan
                .into_chunks()
                .into_iter()
                .zip(connections)
                .enumerate()
                .map(|(worker, ((offset, chunk), conn))| {
                    let tx = tx.clone();
                    scope.spawn(move || run_worker(worker, conn, offset, chunk, tx))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .filter(|joined| joined.is_err())
                .count()
        });
        drop(tx);

        self.discard_all(&extras);

        let mut results: Vec<Option<Result<Response>>> = (0..total).map(|_| None).collect();
        for (index, result) in rx.try_iter() {
            results[index] = Some(result);
        }

        if panicked > 0 {
            tracing::error!("{} batch worker(s) panicked", panicked);
        }

        let mut responses = Vec::with_capacity(total);
        for slot in results {
            match slot {
                Some(Ok(response)) => responses.push(response),
                Some(Err(e)) => return Err(e),
                // Every worker reports every item, so a gap means one panicked.
                None => return Err(SsdbError::WorkerPanicked),
            }
        }
        Ok(responses)
    }

    fn discard_all(&self, connections: &[Connection]) {
        for conn in connections {
            self.pool.discard(conn);
        }
    }
}

fn run_worker(
    worker: usize,
    conn: &Connection,
    offset: usize,
    chunk: Vec<Command>,
    tx: channel::Sender<(usize, Result<Response>)>,
) {
    for (i, command) in chunk.iter().enumerate() {
        let result = dispatcher::execute(conn, command).and_then(Response::check);
        if let Err(e) = &result {
            tracing::warn!(
                "Batch worker {} failed at item {}: {}",
                worker,
                offset + i,
                e
            );
        }
        // The receiver outlives every worker; a send cannot fail here.
        let _ = tx.send((offset + i, result));
    }
}
