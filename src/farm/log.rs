//! Task Log
//!
//! The shared, durable log every node appends accepted tasks to and polls for
//! tasks created elsewhere. The physical store belongs to the hosting
//! application; this module defines the contract and an in-process
//! implementation.

use super::types::*;
use crate::error::FarmResult;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[async_trait]
pub trait TaskLog: Send + Sync {
    /// Appends a task and returns its log position.
    async fn append(&self, origin: &NodeId, task: TaskInstance) -> FarmResult<u64>;

    /// Returns up to `max` entries with an id greater than `after`, oldest first.
    async fn read_after(&self, after: u64, max: usize) -> FarmResult<Vec<LogEntry>>;

    /// Deletes every entry whose type id is listed. Returns the number removed.
    async fn purge_types(&self, type_ids: &[String]) -> FarmResult<usize>;

    async fn len(&self) -> FarmResult<usize>;
}

/// In-memory log shared by everything in one process.
pub struct MemoryTaskLog {
    entries: RwLock<Vec<LogEntry>>,
    next_id: AtomicU64,
}

impl MemoryTaskLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryTaskLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskLog for MemoryTaskLog {
    async fn append(&self, origin: &NodeId, task: TaskInstance) -> FarmResult<u64> {
        let mut entries = self.entries.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Appending task {} as log entry {}", task.type_id, id);
        entries.push(LogEntry {
            id,
            origin: origin.clone(),
            task,
            created_at: now_ms(),
        });
        Ok(id)
    }

    async fn read_after(&self, after: u64, max: usize) -> FarmResult<Vec<LogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.id > after)
            .take(max)
            .cloned()
            .collect())
    }

    async fn purge_types(&self, type_ids: &[String]) -> FarmResult<usize> {
        let purge: HashSet<&str> = type_ids.iter().map(String::as_str).collect();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| !purge.contains(entry.task.type_id.as_str()));
        Ok(before - entries.len())
    }

    async fn len(&self) -> FarmResult<usize> {
        Ok(self.entries.read().await.len())
    }
}
