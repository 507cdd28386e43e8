//! Task Emitter
//!
//! The producer side of the web farm: gate a candidate task, then hand it to
//! the shared log either immediately or through a pending buffer that is
//! optimized before it is written.

use super::gate::CreationGate;
use super::log::TaskLog;
use super::optimizer::optimize;
use super::registry::TaskRegistry;
use super::types::*;
use crate::error::{FarmError, FarmResult};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct TaskEmitter {
    node_id: NodeId,
    registry: Arc<TaskRegistry>,
    gate: Arc<CreationGate>,
    log: Arc<dyn TaskLog>,
    pending: Mutex<Vec<TaskInstance>>,
}

impl TaskEmitter {
    pub fn new(
        node_id: NodeId,
        registry: Arc<TaskRegistry>,
        gate: Arc<CreationGate>,
        log: Arc<dyn TaskLog>,
    ) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            registry,
            gate,
            log,
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Gates `task` and appends it to the log right away.
    ///
    /// # Returns
    /// The log position, or `None` if the gate rejected the task.
    pub async fn emit(&self, task: TaskInstance) -> FarmResult<Option<u64>> {
        if !self.gate.can_create(&task)? {
            return Ok(None);
        }
        let id = self.log.append(&self.node_id, task).await?;
        Ok(Some(id))
    }

    /// Serializes `payload` into a new task of `type_id` and emits it.
    pub async fn emit_payload<T: Serialize>(
        &self,
        type_id: &str,
        target: &str,
        payload: &T,
    ) -> FarmResult<Option<u64>> {
        let task = TaskInstance::new(type_id, target)
            .with_payload(payload)
            .map_err(|source| FarmError::Payload {
                type_id: type_id.to_string(),
                source,
            })?;
        self.emit(task).await
    }

    /// Gates `task` and buffers it until the next [`flush`](Self::flush).
    pub async fn enqueue(&self, task: TaskInstance) -> FarmResult<bool> {
        if !self.gate.can_create(&task)? {
            return Ok(false);
        }
        self.pending.lock().await.push(task);
        Ok(true)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Optimizes the buffered tasks and appends them to the log.
    ///
    /// Returns the number of entries written.
    pub async fn flush(&self) -> FarmResult<usize> {
        let tasks = std::mem::take(&mut *self.pending.lock().await);
        if tasks.is_empty() {
            return Ok(0);
        }

        let tasks = optimize(&self.registry, tasks);
        let count = tasks.len();
        for task in tasks {
            self.log.append(&self.node_id, task).await?;
        }

        tracing::debug!("Flushed {} pending tasks to the log", count);
        Ok(count)
    }

    /// Spawns a loop flushing the pending buffer every `interval`.
    pub fn start(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            "Starting task emitter flush loop (every {} ms)",
            interval.as_millis()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = self.flush().await {
                    tracing::warn!("Failed to flush pending tasks: {}", e);
                }
            }
        })
    }
}
