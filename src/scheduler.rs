// src/scheduler.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered parallel batch execution
//!
//! Batches are produced on a fixed rayon pool and handed to a sink on the
//! calling thread strictly in index order. A bounded window of outstanding
//! batches (in flight + waiting in the reorder buffer) caps memory use.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::COORDINATOR_RESERVED_CPUS;
use crate::error::{GenerationError, Result};
use crate::generator::Batch;

/// How often the coordinator re-checks for cancellation while waiting
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative cancellation flag shared between the caller and a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the run stops dispatching and cleans up.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed worker pool plus in-order result collection
pub struct BatchScheduler {
    pool: rayon::ThreadPool,
    workers: usize,
    max_in_flight: usize,
}

impl BatchScheduler {
    pub fn new(workers: usize, max_in_flight: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dgen-csv-worker-{}", i))
            .build()
            .map_err(|e| {
                GenerationError::Io(std::io::Error::other(format!(
                    "failed to create thread pool: {}",
                    e
                )))
            })?;

        tracing::info!(
            "Batch scheduler ready: {} workers, up to {} batches outstanding",
            workers,
            max_in_flight
        );

        Ok(Self {
            pool,
            workers,
            max_in_flight: max_in_flight.max(1),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Produce batches `0..total_batches` in parallel and feed them to `sink`
    /// in index order. Returns the number of batches delivered.
    ///
    /// Stops dispatching on the first worker error, sink error or
    /// cancellation; queued batches that have not started are skipped and
    /// in-flight ones are waited for before returning.
    pub fn run<P, S>(
        &self,
        total_batches: u64,
        cancel: &CancelToken,
        produce: P,
        mut sink: S,
    ) -> Result<u64>
    where
        P: Fn(u64) -> Result<Batch> + Sync,
        S: FnMut(Batch) -> Result<()>,
    {
        let halt = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<(u64, Result<Batch>)>();
        // Dropped once every batch is dispatched, so the channel disconnects
        // when the last worker sends (or dies without sending).
        let mut tx = Some(tx);
        let produce = &produce;
        let halt_ref = &halt;

        tracing::debug!("Dispatching {} batches", total_batches);

        self.pool.in_place_scope(|scope| {
            let mut next_dispatch = 0u64;
            let mut next_write = 0u64;
            let mut in_flight = 0usize;
            let mut reorder: BTreeMap<u64, Batch> = BTreeMap::new();

            let outcome = 'collect: loop {
                if cancel.is_cancelled() {
                    tracing::info!(
                        "Cancellation requested after {} of {} batches",
                        next_write,
                        total_batches
                    );
                    break Err(GenerationError::Cancelled);
                }

                while next_dispatch < total_batches
                    && in_flight + reorder.len() < self.max_in_flight
                {
                    let Some(sender) = tx.as_ref() else { break };
                    let index = next_dispatch;
                    let tx = sender.clone();
                    scope.spawn(move |_| {
                        if halt_ref.load(Ordering::Relaxed) || cancel.is_cancelled() {
                            let _ = tx.send((index, Err(GenerationError::Cancelled)));
                            return;
                        }
                        let result = panic::catch_unwind(AssertUnwindSafe(|| produce(index)))
                            .unwrap_or_else(|payload| {
                                Err(GenerationError::WorkerFailure {
                                    batch: index,
                                    reason: panic_message(payload.as_ref()),
                                })
                            });
                        let _ = tx.send((index, result));
                    });
                    next_dispatch += 1;
                    in_flight += 1;
                }
                if next_dispatch == total_batches {
                    drop(tx.take());
                }

                while let Some(batch) = reorder.remove(&next_write) {
                    tracing::trace!("Delivering batch {}", next_write);
                    if let Err(e) = sink(batch) {
                        break 'collect Err(e);
                    }
                    next_write += 1;
                }

                if next_write == total_batches {
                    break Ok(next_write);
                }

                match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                    Ok((index, Ok(batch))) => {
                        in_flight -= 1;
                        if index != next_write {
                            tracing::debug!(
                                "Batch {} finished early, buffering (waiting on {})",
                                index,
                                next_write
                            );
                        }
                        reorder.insert(index, batch);
                    }
                    Ok((_, Err(e))) => break Err(e),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        break Err(GenerationError::WorkerFailure {
                            batch: next_write,
                            reason: format!(
                                "{} workers exited without reporting a result",
                                in_flight
                            ),
                        })
                    }
                }
            };

            if let Err(e) = &outcome {
                tracing::debug!("Halting dispatch: {}", e);
                halt.store(true, Ordering::Relaxed);
            }
            outcome
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Worker pool size: available CPUs minus those reserved for the
/// coordinator and I/O, never less than one.
pub fn default_worker_count() -> usize {
    get_affinity_cpu_count()
        .saturating_sub(COORDINATOR_RESERVED_CPUS)
        .max(1)
}

/// Get CPU count from current process affinity mask
/// Falls back to num_cpus::get() if affinity cannot be determined
pub fn get_affinity_cpu_count() -> usize {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let allowed = status
                .lines()
                .find_map(|line| line.strip_prefix("Cpus_allowed_list:"))
                .map(str::trim);
            if let Some(cpus) = allowed {
                let count = parse_cpu_list(cpus);
                if count > 0 {
                    tracing::debug!("CPU affinity mask: {} CPUs ({})", count, cpus);
                    return count;
                }
            }
        }
    }

    num_cpus::get()
}

/// Parse Linux CPU list (e.g., "0-23" or "0-11,24-35")
#[cfg(any(target_os = "linux", test))]
fn parse_cpu_list(cpu_list: &str) -> usize {
    let mut count = 0;
    for range in cpu_list.split(',') {
        let range = range.trim();
        if range.is_empty() {
            continue;
        }

        if let Some((start, end)) = range.split_once('-') {
            if let (Ok(s), Ok(e)) = (start.parse::<usize>(), end.parse::<usize>()) {
                if e >= s {
                    count += (e - s) + 1;
                }
            }
        } else if range.parse::<usize>().is_ok() {
            count += 1;
        }
    }
    count
}
