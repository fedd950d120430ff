//! Priority Queue + Worker Pool (C8): three capacity-bounded FIFO queues,
//! strict priority draining, and admission control over a bounded pool of
//! workers (§4.8).

use crate::types::{now_millis, Priority, QueuedRequest};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, Semaphore};

/// Per-priority FIFO queue capped at `capacity`. Expired entries are
/// discarded silently at dequeue, never at enqueue (§3 `QueuedRequest`).
struct Lane<T> {
    items: VecDeque<QueuedRequest<T>>,
    capacity: usize,
}

impl<T> Lane<T> {
    fn new(capacity: usize) -> Self {
        Lane {
            items: VecDeque::new(),
            capacity,
        }
    }
}

/// Bounded, priority-ordered admission queue. All `High` entries are
/// dequeued before any `Normal`; all `Normal` before any `Low` (§4.8,
/// invariant 5). Backed by `tokio::sync::Mutex` since lanes are only ever
/// touched from async task contexts.
pub struct PriorityQueue<T> {
    high: Mutex<Lane<T>>,
    normal: Mutex<Lane<T>>,
    low: Mutex<Lane<T>>,
    notify: Notify,
    len: AtomicUsize,
}

/// Returned by [`PriorityQueue::enqueue`] on a full lane (§4.8 "Backpressure").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    QueueFull,
}

impl<T> PriorityQueue<T> {
    pub fn new(capacity_per_lane: usize) -> Self {
        PriorityQueue {
            high: Mutex::new(Lane::new(capacity_per_lane)),
            normal: Mutex::new(Lane::new(capacity_per_lane)),
            low: Mutex::new(Lane::new(capacity_per_lane)),
            notify: Notify::new(),
            len: AtomicUsize::new(0),
        }
    }

    fn lane(&self, priority: Priority) -> &Mutex<Lane<T>> {
        match priority {
            Priority::High => &self.high,
            Priority::Normal => &self.normal,
            Priority::Low => &self.low,
        }
    }

    /// Admits `payload` at `priority`. Returns `Err(QueueFull)` without
    /// blocking if that priority's lane is at capacity.
    pub async fn enqueue(
        &self,
        payload: T,
        priority: Priority,
        timeout_millis: i64,
    ) -> Result<(), EnqueueError> {
        let mut lane = self.lane(priority).lock().await;
        if lane.items.len() >= lane.capacity {
            return Err(EnqueueError::QueueFull);
        }
        lane.items.push_back(QueuedRequest {
            payload,
            priority,
            enqueued_at_millis: now_millis(),
            timeout_millis,
        });
        drop(lane);
        self.len.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
        Ok(())
    }

    /// Pops the highest-priority, earliest-enqueued non-expired entry,
    /// waiting if every lane is empty. Expired entries are dropped silently
    /// as the lanes are scanned.
    pub async fn dequeue(&self) -> T {
        loop {
            if let Some(payload) = self.try_dequeue_once().await {
                return payload;
            }
            self.notify.notified().await;
        }
    }

    async fn try_dequeue_once(&self) -> Option<T> {
        for priority in [Priority::High, Priority::Normal, Priority::Low] {
            let mut lane = self.lane(priority).lock().await;
            let now = now_millis();
            while let Some(front) = lane.items.front() {
                if front.is_expired(now) {
                    lane.items.pop_front();
                    self.len.fetch_sub(1, Ordering::SeqCst);
                    continue;
                }
                let item = lane.items.pop_front().expect("front just checked Some");
                self.len.fetch_sub(1, Ordering::SeqCst);
                return Some(item.payload);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Admission control over a bounded pool of concurrent in-flight requests
/// (§4.8 "a worker only proceeds if the active-request counter is below
/// `maxConcurrent`"). Implemented as a counting semaphore; a worker that
/// cannot acquire a permit yields back to the scheduler rather than busy-waiting.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    worker_count: usize,
}

/// Held for the duration of one in-flight request; dropping it releases
/// the admission slot.
pub struct AdmissionGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl WorkerPool {
    pub fn new(worker_count: usize, max_concurrent: usize) -> Self {
        WorkerPool {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Waits for an admission slot. Suspension here is one of the
    /// documented suspension points (§5).
    pub async fn admit(&self) -> AdmissionGuard {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");
        AdmissionGuard { _permit: permit }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn high_priority_drains_before_normal() {
        let queue: PriorityQueue<&str> = PriorityQueue::new(10);
        queue.enqueue("normal", Priority::Normal, 10_000).await.unwrap();
        queue.enqueue("high", Priority::High, 10_000).await.unwrap();

        assert_eq!(queue.dequeue().await, "high");
        assert_eq!(queue.dequeue().await, "normal");
    }

    #[tokio::test]
    async fn enqueue_fails_when_lane_is_full() {
        let queue: PriorityQueue<&str> = PriorityQueue::new(1);
        queue.enqueue("a", Priority::Normal, 10_000).await.unwrap();
        let err = queue.enqueue("b", Priority::Normal, 10_000).await.unwrap_err();
        assert_eq!(err, EnqueueError::QueueFull);
    }

    #[tokio::test]
    async fn different_lanes_have_independent_capacity() {
        let queue: PriorityQueue<&str> = PriorityQueue::new(1);
        queue.enqueue("a", Priority::Normal, 10_000).await.unwrap();
        assert!(queue.enqueue("b", Priority::High, 10_000).await.is_ok());
    }

    #[tokio::test]
    async fn worker_pool_limits_concurrent_admission() {
        let pool = WorkerPool::new(2, 1);
        let _guard = pool.admit().await;
        assert_eq!(pool.available_permits(), 0);
    }
}
