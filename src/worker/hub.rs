//! Holds at most one running queue per worker type.

use super::queue::{QueueWorker, WorkerQueue};

use async_trait::async_trait;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
trait ManagedQueue: Send + Sync {
    fn name(&self) -> &'static str;
    async fn stop(&self);
}

#[async_trait]
impl<W: QueueWorker> ManagedQueue for WorkerQueue<W> {
    fn name(&self) -> &'static str {
        WorkerQueue::name(self)
    }

    async fn stop(&self) {
        WorkerQueue::stop(self).await
    }
}

struct HubEntry {
    queue: Arc<dyn Any + Send + Sync>,
    managed: Arc<dyn ManagedQueue>,
}

pub struct WorkerHub {
    queues: DashMap<TypeId, HubEntry>,
    tick: Duration,
}

impl WorkerHub {
    pub fn new(tick: Duration) -> Arc<Self> {
        Arc::new(Self {
            queues: DashMap::new(),
            tick,
        })
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Returns the queue for `W`, starting it with `make()` on first use.
    /// Later calls get the same instance and never call `make`.
    pub fn get_or_start<W, F>(&self, make: F) -> Arc<WorkerQueue<W>>
    where
        W: QueueWorker,
        F: FnOnce() -> W,
    {
        let entry = self.queues.entry(TypeId::of::<W>()).or_insert_with(|| {
            let queue = WorkerQueue::start(make(), self.tick);
            HubEntry {
                queue: queue.clone(),
                managed: queue,
            }
        });

        downcast::<W>(&entry.queue)
    }

    pub fn get<W: QueueWorker>(&self) -> Option<Arc<WorkerQueue<W>>> {
        self.queues
            .get(&TypeId::of::<W>())
            .map(|entry| downcast::<W>(&entry.queue))
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Stops every queue, running each worker's `finish` hook.
    pub async fn shutdown(&self) {
        let managed: Vec<Arc<dyn ManagedQueue>> = self
            .queues
            .iter()
            .map(|entry| entry.value().managed.clone())
            .collect();

        for queue in managed {
            tracing::info!("Stopping worker queue '{}'", queue.name());
            queue.stop().await;
        }
    }
}

fn downcast<W: QueueWorker>(queue: &Arc<dyn Any + Send + Sync>) -> Arc<WorkerQueue<W>> {
    // Entries are keyed by `TypeId::of::<W>()`, so the stored value is always a `WorkerQueue<W>`.
    match queue.clone().downcast::<WorkerQueue<W>>() {
        Ok(queue) => queue,
        Err(_) => unreachable!("worker hub entry stored under the wrong type"),
    }
}
