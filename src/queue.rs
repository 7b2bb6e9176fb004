//! Bounded task queue and the reply-handle race.
//!
//! Backed by `async_channel` (bounded, multi-producer multi-consumer) in
//! place of a hand-rolled mutex plus condition variables.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::metrics::QUEUE_DEPTH;
use crate::model::EnqueuedTask;

/// A single-shot resolver that causes at most one HTTP response write to the
/// originating connection.
///
/// The underlying `oneshot::Sender` already enforces "at most one value
/// delivered" structurally, but `resolved` is kept as an explicit
/// compare-and-swap guard so callers can learn whether they won the race,
/// which the writer pool uses to decide whether an insert failure needs
/// logging.
pub struct ReplyHandle {
    tx: std::sync::Mutex<Option<oneshot::Sender<(u16, String)>>>,
    resolved: AtomicBool,
}

impl ReplyHandle {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<(u16, String)>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: std::sync::Mutex::new(Some(tx)),
                resolved: AtomicBool::new(false),
            }),
            rx,
        )
    }

    /// Attempts to resolve this handle with `(status, body)`.
    ///
    /// Returns `true` if this call won the race and the value will be
    /// delivered; `false` if the handle was already resolved (the timer
    /// already fired, or a previous resolve already ran).
    pub fn resolve(&self, status: u16, body: String) -> bool {
        if self.resolved.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(tx) = self.tx.lock().unwrap().take() {
            // A send error means the receiving session already dropped
            // (client disconnected); nothing more to do.
            let _ = tx.send((status, body));
        }
        true
    }
}

/// Decouples ingress rate from writer throughput with a fixed capacity.
///
/// FIFO, non-blocking `try_push` for the ingress, blocking `pop` for
/// writers, idempotent `stop`. `queue_depth` is maintained as a Prometheus
/// gauge incremented on successful enqueue and decremented on dequeue.
pub struct TaskQueue {
    tx: async_channel::Sender<EnqueuedTask>,
    rx: async_channel::Receiver<EnqueuedTask>,
}

impl TaskQueue {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Non-blocking enqueue. Succeeds iff the queue is not stopped and not
    /// at capacity. Used by the HTTP ingress.
    pub fn try_push(&self, task: EnqueuedTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => {
                QUEUE_DEPTH.inc();
                true
            }
            Err(_) => false,
        }
    }

    /// Blocking enqueue; waits for capacity or for the queue to stop.
    /// Not used by the HTTP ingress, which always uses `try_push` so a
    /// saturated queue rejects immediately rather than stalling a
    /// connection; kept for callers that should apply backpressure instead.
    pub async fn push(&self, task: EnqueuedTask) -> bool {
        match self.tx.send(task).await {
            Ok(()) => {
                QUEUE_DEPTH.inc();
                true
            }
            Err(_) => false,
        }
    }

    /// Blocking dequeue. Returns `None` once the queue is both empty and
    /// stopped; used by writers.
    pub async fn pop(&self) -> Option<EnqueuedTask> {
        match self.rx.recv().await {
            Ok(task) => {
                QUEUE_DEPTH.dec();
                Some(task)
            }
            Err(_) => None,
        }
    }

    /// Marks the queue stopped and wakes all blocked waiters. Idempotent.
    pub fn stop(&self) {
        self.tx.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }

    /// Current number of buffered tasks. Exposed mainly for tests; the
    /// live `queue_depth` Prometheus gauge is the operational equivalent.
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IngestBody;

    fn task(id: &str) -> EnqueuedTask {
        let mut metrics = std::collections::HashMap::new();
        metrics.insert("a".to_string(), 1.0);
        EnqueuedTask::from_body(
            id.to_string(),
            IngestBody {
                sensor_id: "s1".to_string(),
                ts: 1_730_000_000,
                metrics,
            },
            None,
        )
    }

    #[test]
    fn capacity_zero_is_invalid() {
        let result = std::panic::catch_unwind(|| TaskQueue::new(0));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn try_push_respects_capacity() {
        let q = TaskQueue::new(1);
        assert!(q.try_push(task("1")));
        assert!(!q.try_push(task("2")), "second push should fail: queue full");
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn pop_returns_fifo_order() {
        let q = TaskQueue::new(4);
        q.try_push(task("1"));
        q.try_push(task("2"));
        let first = q.pop().await.unwrap();
        let second = q.pop().await.unwrap();
        assert_eq!(first.request_id, "1");
        assert_eq!(second.request_id, "2");
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_rejects_future_pushes() {
        let q = TaskQueue::new(4);
        q.stop();
        q.stop();
        assert!(!q.try_push(task("late")));
        assert!(q.is_stopped());
    }

    #[tokio::test]
    async fn stop_after_push_drains_then_returns_none() {
        let q = TaskQueue::new(4);
        q.try_push(task("1"));
        q.stop();
        assert!(q.pop().await.is_some(), "buffered task must still drain");
        assert!(q.pop().await.is_none(), "empty and stopped => sentinel");
    }

    #[tokio::test]
    async fn reply_handle_resolves_exactly_once() {
        let (handle, rx) = ReplyHandle::new();
        assert!(handle.resolve(200, "{\"status\":\"ok\"}".to_string()));
        assert!(!handle.resolve(500, "late".to_string()), "second resolve must lose the race");
        let (status, body) = rx.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, "{\"status\":\"ok\"}");
    }

    #[test]
    fn pop_is_pending_until_a_task_is_pushed() {
        let q = TaskQueue::new(1);
        let mut fut = tokio_test::task::spawn(q.pop());
        tokio_test::assert_pending!(fut.poll());
        assert!(q.try_push(task("1")));
        tokio_test::assert_ready!(fut.poll());
    }
}
