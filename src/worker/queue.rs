//! Timer-driven worker queue.
//!
//! Producers on any thread push items with [`WorkerQueue::enqueue`]; a single
//! background task wakes on a fixed tick, takes the items queued at that
//! moment and hands them one by one to the owned [`QueueWorker`]. Because only
//! that task touches the worker, the state it owns needs no locking for writes.

use crate::error::{FarmError, FarmResult};

use anyhow::Result;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::sync::mpsc::error::TryRecvError;

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Item processor owned by a [`WorkerQueue`].
pub trait QueueWorker: Send + 'static {
    type Item: Send + 'static;
    /// State the worker shares with readers on other threads.
    type Shared: Send + Sync + 'static;

    /// Queue name used in logs.
    const NAME: &'static str;

    fn shared(&self) -> Arc<Self::Shared>;

    fn process_item(&mut self, item: Self::Item) -> Result<()>;

    /// Runs once when the queue stops.
    fn finish(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Waiting for the next tick.
    Idle,
    /// Tick fired, looking for work.
    Running,
    /// Processing items.
    Draining,
    /// Loop ended; enqueues fail.
    Stopped,
}

impl QueueState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => QueueState::Idle,
            1 => QueueState::Running,
            2 => QueueState::Draining,
            _ => QueueState::Stopped,
        }
    }
}

enum Command<T> {
    Item(T),
    Flush(oneshot::Sender<()>),
    Stop,
}

struct QueueCounters {
    state: AtomicU8,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl QueueCounters {
    fn set_state(&self, state: QueueState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

pub struct WorkerQueue<W: QueueWorker> {
    sender: mpsc::UnboundedSender<Command<W::Item>>,
    shared: Arc<W::Shared>,
    counters: Arc<QueueCounters>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<W: QueueWorker> WorkerQueue<W> {
    /// Moves `worker` onto a new background task. Must be called inside a
    /// Tokio runtime.
    pub fn start(worker: W, tick: Duration) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = worker.shared();
        let counters = Arc::new(QueueCounters {
            state: AtomicU8::new(QueueState::Idle as u8),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        tracing::info!("Starting worker queue '{}' (tick {} ms)", W::NAME, tick.as_millis());

        let loop_counters = counters.clone();
        let handle = tokio::spawn(async move {
            run_loop(worker, receiver, tick, loop_counters).await;
        });

        Arc::new(Self {
            sender,
            shared,
            counters,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &'static str {
        W::NAME
    }

    pub fn shared(&self) -> &Arc<W::Shared> {
        &self.shared
    }

    /// Appends an item. Never blocks.
    ///
    /// Fails with `QueueStopped` once the loop has seen a stop request; every
    /// item accepted before that point is processed before `finish` runs.
    pub fn enqueue(&self, item: W::Item) -> FarmResult<()> {
        self.sender
            .send(Command::Item(item))
            .map_err(|_| FarmError::QueueStopped(W::NAME))
    }

    /// Waits until every item enqueued before this call has been processed.
    pub async fn flush(&self) -> FarmResult<()> {
        let (done, wait) = oneshot::channel();
        self.sender
            .send(Command::Flush(done))
            .map_err(|_| FarmError::QueueStopped(W::NAME))?;
        wait.await.map_err(|_| FarmError::QueueStopped(W::NAME))
    }

    /// Processes what is already queued, runs `finish` and ends the loop.
    /// Waits until the loop has ended.
    pub async fn stop(&self) {
        let _ = self.sender.send(Command::Stop);
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!("Worker queue '{}' ended abnormally: {}", W::NAME, e);
            }
        }
    }

    pub fn state(&self) -> QueueState {
        QueueState::from_u8(self.counters.state.load(Ordering::SeqCst))
    }

    /// Items handed to the worker so far, failed ones included.
    pub fn processed_count(&self) -> u64 {
        self.counters.processed.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> u64 {
        self.counters.failed.load(Ordering::SeqCst)
    }
}

async fn run_loop<W: QueueWorker>(
    mut worker: W,
    mut receiver: mpsc::UnboundedReceiver<Command<W::Item>>,
    tick: Duration,
    counters: Arc<QueueCounters>,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        counters.set_state(QueueState::Running);

        // Only what is queued now; later items wait for the next tick.
        let queued = receiver.len().max(1);
        let mut stop = false;
        for _ in 0..queued {
            match receiver.try_recv() {
                Ok(Command::Item(item)) => {
                    counters.set_state(QueueState::Draining);
                    process_one(&mut worker, item, &counters);
                }
                Ok(Command::Flush(done)) => {
                    let _ = done.send(());
                }
                Ok(Command::Stop) | Err(TryRecvError::Disconnected) => {
                    stop = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        if stop {
            // New sends fail from here on; everything accepted before is applied.
            receiver.close();
            while let Some(command) = receiver.recv().await {
                match command {
                    Command::Item(item) => process_one(&mut worker, item, &counters),
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                    Command::Stop => {}
                }
            }

            worker.finish();
            counters.set_state(QueueState::Stopped);
            tracing::info!(
                "Worker queue '{}' stopped after {} items ({} failed)",
                W::NAME,
                counters.processed.load(Ordering::SeqCst),
                counters.failed.load(Ordering::SeqCst)
            );
            return;
        }

        counters.set_state(QueueState::Idle);
    }
}

/// Runs one item; errors and panics are logged and the item is dropped.
fn process_one<W: QueueWorker>(worker: &mut W, item: W::Item, counters: &QueueCounters) {
    counters.processed.fetch_add(1, Ordering::SeqCst);

    match catch_unwind(AssertUnwindSafe(|| worker.process_item(item))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            tracing::error!("Worker queue '{}' failed to process item: {:#}", W::NAME, e);
        }
        Err(panic) => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Worker queue '{}' panicked processing item: {}", W::NAME, message);
        }
    }
}
