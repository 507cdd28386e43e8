//! Task Log Processor
//!
//! Polls the shared log for tasks created by other nodes and applies them
//! locally through the [`TaskDispatcher`].
//!
//! ## Failure policy
//! Delivery is best-effort. A task that cannot be applied (unknown type,
//! malformed payload, or an error from its own logic) is logged, counted and
//! dropped; the cursor always moves past it. Nodes catch up on the next
//! successful task of the same kind.

use super::dispatcher::TaskDispatcher;
use super::log::TaskLog;
use super::registry::TaskRegistry;
use super::types::*;
use crate::error::FarmResult;

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Outcome counts of one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub applied: usize,
    /// Unknown type or payload that could not be rebuilt.
    pub dropped: usize,
    /// The payload's own logic returned an error.
    pub failed: usize,
    /// Entries this node created itself.
    pub skipped: usize,
}

/// Lifetime counters of a processor.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    pub applied: AtomicU64,
    pub dropped: AtomicU64,
    pub failed: AtomicU64,
    pub skipped: AtomicU64,
}

pub struct TaskProcessor {
    node_id: NodeId,
    log: Arc<dyn TaskLog>,
    dispatcher: Arc<TaskDispatcher>,
    /// Id of the last log entry handled.
    cursor: AtomicU64,
    /// Held for a whole pass: each entry reaches the dispatcher once.
    pass: Mutex<()>,
    batch_size: usize,
    poll_interval: Duration,
    stats: ProcessorStats,
}

impl TaskProcessor {
    pub fn new(
        node_id: NodeId,
        log: Arc<dyn TaskLog>,
        dispatcher: Arc<TaskDispatcher>,
        batch_size: usize,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            log,
            dispatcher,
            cursor: AtomicU64::new(0),
            pass: Mutex::new(()),
            batch_size: batch_size.max(1),
            poll_interval,
            stats: ProcessorStats::default(),
        })
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// Removes memory-only tasks from the log. Run at start-up: those tasks only
    /// touched caches that no longer exist.
    pub async fn purge_memory_tasks(&self, registry: &TaskRegistry) -> FarmResult<usize> {
        let types = registry.memory_task_types();
        if types.is_empty() {
            return Ok(0);
        }
        let purged = self.log.purge_types(&types).await?;
        tracing::info!("Purged {} memory-only tasks from the log", purged);
        Ok(purged)
    }

    /// Applies every entry currently available after the cursor.
    ///
    /// Concurrent calls run one after the other; a call that waited finds the
    /// entries of the previous pass already behind the cursor.
    pub async fn process_pending(&self) -> FarmResult<ProcessReport> {
        let _pass = self.pass.lock().await;
        let mut report = ProcessReport::default();

        loop {
            let entries = self.log.read_after(self.cursor(), self.batch_size).await?;
            if entries.is_empty() {
                break;
            }

            for entry in entries {
                self.process_entry(&entry, &mut report).await;
                self.cursor.fetch_max(entry.id, Ordering::SeqCst);
            }
        }

        if report != ProcessReport::default() {
            tracing::debug!("Processed task log: {:?}", report);
        }

        Ok(report)
    }

    async fn process_entry(&self, entry: &LogEntry, report: &mut ProcessReport) {
        if entry.origin == self.node_id {
            report.skipped += 1;
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match self.dispatcher.execute_instance(&entry.task).await {
            Ok(true) => {
                report.applied += 1;
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {
                tracing::warn!(
                    "Dropped log entry {} ({}) from {:?}",
                    entry.id,
                    entry.task.type_id,
                    entry.origin
                );
                report.dropped += 1;
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(
                    "Task {} (log entry {}, target '{}') failed: {:#}",
                    entry.task.type_id,
                    entry.id,
                    entry.task.target,
                    e
                );
                report.failed += 1;
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Spawns the polling loop and returns its handle.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            "Starting task log processor (poll every {} ms)",
            self.poll_interval.as_millis()
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if let Err(e) = self.process_pending().await {
                    tracing::warn!("Failed to read task log: {}", e);
                }
            }
        })
    }
}
