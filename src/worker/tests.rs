//! Worker Queue Tests
//!
//! ## Test Scopes
//! - **Ordering**: items from one producer are processed in FIFO order; a tick
//!   only takes the items queued when it fired.
//! - **Isolation**: failing and panicking items do not stop the loop.
//! - **Lifecycle**: `flush`, `stop`, the `finish` hook and state transitions.
//! - **Hub**: one queue instance per worker type.

#[cfg(test)]
mod tests {
    use crate::error::FarmError;
    use crate::worker::hub::WorkerHub;
    use crate::worker::queue::{QueueState, QueueWorker, WorkerQueue};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, OnceLock, Weak};
    use std::time::{Duration, Instant};

    const TICK: Duration = Duration::from_millis(5);

    #[derive(Default)]
    struct Recorded {
        items: Mutex<Vec<i32>>,
        finished: AtomicBool,
    }

    /// Records every item; negative items fail, zero panics.
    struct RecordingWorker {
        recorded: Arc<Recorded>,
    }

    impl RecordingWorker {
        fn new() -> Self {
            Self {
                recorded: Arc::new(Recorded::default()),
            }
        }
    }

    impl QueueWorker for RecordingWorker {
        type Item = i32;
        type Shared = Recorded;
        const NAME: &'static str = "recording";

        fn shared(&self) -> Arc<Recorded> {
            self.recorded.clone()
        }

        fn process_item(&mut self, item: i32) -> anyhow::Result<()> {
            if item == 0 {
                panic!("zero is not allowed");
            }
            if item < 0 {
                return Err(anyhow::anyhow!("negative item {}", item));
            }
            self.recorded.items.lock().unwrap().push(item);
            Ok(())
        }

        fn finish(&mut self) {
            self.recorded.finished.store(true, Ordering::SeqCst);
        }
    }

    struct CountingWorker;

    impl QueueWorker for CountingWorker {
        type Item = ();
        type Shared = ();
        const NAME: &'static str = "counting";

        fn shared(&self) -> Arc<()> {
            Arc::new(())
        }

        fn process_item(&mut self, _item: ()) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Chain {
        queue: OnceLock<Weak<WorkerQueue<ChainWorker>>>,
        processed_at: Mutex<Vec<Instant>>,
    }

    /// Re-enqueues `n - 1` into its own queue until it reaches zero.
    struct ChainWorker {
        chain: Arc<Chain>,
    }

    impl QueueWorker for ChainWorker {
        type Item = u32;
        type Shared = Chain;
        const NAME: &'static str = "chain";

        fn shared(&self) -> Arc<Chain> {
            self.chain.clone()
        }

        fn process_item(&mut self, n: u32) -> anyhow::Result<()> {
            self.chain.processed_at.lock().unwrap().push(Instant::now());
            if n > 0 {
                if let Some(queue) = self.chain.queue.get().and_then(Weak::upgrade) {
                    queue.enqueue(n - 1)?;
                }
            }
            Ok(())
        }
    }

    // ============================================================
    // ORDERING
    // ============================================================

    #[tokio::test]
    async fn test_items_processed_in_fifo_order() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);

        for i in 1..=50 {
            queue.enqueue(i).unwrap();
        }
        queue.flush().await.unwrap();

        let items = queue.shared().items.lock().unwrap().clone();
        assert_eq!(items, (1..=50).collect::<Vec<_>>());
        assert_eq!(queue.processed_count(), 50);
    }

    #[tokio::test]
    async fn test_concurrent_producers_keep_their_own_order() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);

        let mut producers = Vec::new();
        for p in 0..4 {
            let queue = queue.clone();
            producers.push(std::thread::spawn(move || {
                for i in 0..100 {
                    queue.enqueue(p * 1000 + i + 1).unwrap();
                }
            }));
        }
        for producer in producers {
            producer.join().unwrap();
        }
        queue.flush().await.unwrap();

        let items = queue.shared().items.lock().unwrap().clone();
        assert_eq!(items.len(), 400);
        for p in 0..4 {
            let own: Vec<i32> = items.iter().copied().filter(|i| i / 1000 == p).collect();
            assert_eq!(own, (1..=100).map(|i| p * 1000 + i).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_items_queued_during_a_drain_wait_for_next_tick() {
        // ARRANGE
        let tick = Duration::from_millis(40);
        let queue = WorkerQueue::start(
            ChainWorker {
                chain: Arc::new(Chain::default()),
            },
            tick,
        );
        assert!(queue.shared().queue.set(Arc::downgrade(&queue)).is_ok());

        // ACT: 3 -> 2 -> 1 -> 0, each enqueued while the previous one is processed
        queue.enqueue(3).unwrap();
        for _ in 0..100 {
            if queue.processed_count() == 4 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // ASSERT: one item per tick, not all four in the first drain
        let times = queue.shared().processed_at.lock().unwrap().clone();
        assert_eq!(times.len(), 4);
        let spread = times[3].duration_since(times[0]);
        assert!(spread >= tick * 2, "chain finished within {:?}", spread);
    }

    // ============================================================
    // FAILURE ISOLATION
    // ============================================================

    #[tokio::test]
    async fn test_failing_item_does_not_stop_loop() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);

        queue.enqueue(1).unwrap();
        queue.enqueue(-1).unwrap();
        queue.enqueue(2).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(*queue.shared().items.lock().unwrap(), vec![1, 2]);
        assert_eq!(queue.failed_count(), 1);
        assert_eq!(queue.processed_count(), 3);
    }

    #[tokio::test]
    async fn test_panicking_item_is_isolated() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);

        queue.enqueue(0).unwrap();
        queue.enqueue(3).unwrap();
        queue.flush().await.unwrap();

        assert_eq!(*queue.shared().items.lock().unwrap(), vec![3]);
        assert_eq!(queue.failed_count(), 1);
        assert_ne!(queue.state(), QueueState::Stopped);
    }

    // ============================================================
    // LIFECYCLE
    // ============================================================

    #[tokio::test]
    async fn test_stop_drains_and_runs_finish() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);

        queue.enqueue(7).unwrap();
        queue.stop().await;

        assert_eq!(queue.state(), QueueState::Stopped);
        assert_eq!(*queue.shared().items.lock().unwrap(), vec![7]);
        assert!(queue.shared().finished.load(Ordering::SeqCst));

        let result = queue.enqueue(8);
        assert!(matches!(result, Err(FarmError::QueueStopped("recording"))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_items_accepted_around_stop_are_never_lost() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                let mut accepted = Vec::new();
                for i in 1..=5000 {
                    if queue.enqueue(i).is_ok() {
                        accepted.push(i);
                    }
                }
                accepted
            })
        };
        tokio::time::sleep(TICK * 2).await;
        queue.stop().await;
        let accepted = producer.join().unwrap();

        assert_eq!(*queue.shared().items.lock().unwrap(), accepted);
        assert_eq!(queue.state(), QueueState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_with_empty_queue_is_fine() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);
        queue.stop().await;

        assert_eq!(queue.state(), QueueState::Stopped);
        assert!(queue.shared().finished.load(Ordering::SeqCst));
        assert_eq!(queue.processed_count(), 0);
    }

    #[tokio::test]
    async fn test_queue_returns_to_idle_after_tick() {
        let queue = WorkerQueue::start(RecordingWorker::new(), TICK);

        queue.enqueue(1).unwrap();
        queue.flush().await.unwrap();
        tokio::time::sleep(TICK * 4).await;

        assert_eq!(queue.state(), QueueState::Idle);
    }

    // ============================================================
    // HUB
    // ============================================================

    #[tokio::test]
    async fn test_hub_keeps_one_queue_per_worker_type() {
        let hub = WorkerHub::new(TICK);
        let made = Arc::new(AtomicUsize::new(0));

        let made_first = made.clone();
        let first = hub.get_or_start(move || {
            made_first.fetch_add(1, Ordering::SeqCst);
            RecordingWorker::new()
        });
        let made_second = made.clone();
        let second = hub.get_or_start(move || {
            made_second.fetch_add(1, Ordering::SeqCst);
            RecordingWorker::new()
        });

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.shared(), second.shared()));
        assert_eq!(made.load(Ordering::SeqCst), 1);

        hub.get_or_start(|| CountingWorker);
        assert_eq!(hub.queue_count(), 2);
        assert!(hub.get::<CountingWorker>().is_some());
    }

    #[tokio::test]
    async fn test_hub_shutdown_stops_all_queues() {
        let hub = WorkerHub::new(TICK);
        let recording = hub.get_or_start(RecordingWorker::new);
        let counting = hub.get_or_start(|| CountingWorker);

        recording.enqueue(5).unwrap();
        hub.shutdown().await;

        assert_eq!(recording.state(), QueueState::Stopped);
        assert_eq!(counting.state(), QueueState::Stopped);
        assert!(recording.shared().finished.load(Ordering::SeqCst));
        assert_eq!(*recording.shared().items.lock().unwrap(), vec![5]);
    }
}
