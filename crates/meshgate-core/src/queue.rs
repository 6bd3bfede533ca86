// ── Message queues ──
//
// Unbounded FIFO shared between the transport (producer) and its
// consumers. Waiting consumers park on a `Notify` instead of polling.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// No matching item arrived before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no matching message within {after:?}")]
pub struct TimedOut {
    pub after: Duration,
}

/// A lock-protected deque with async matching waits.
///
/// `pop_matching` scans in place: items that do not satisfy the
/// predicate stay queued in arrival order for the next consumer.
/// Nothing is requeued, so a waiter cannot be starved by items it
/// rejects, at the cost of a linear scan per wakeup.
pub struct MessageQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Append an item and wake every waiter. Never blocks.
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
        self.notify.notify_waiters();
    }

    /// Remove and return everything currently queued, oldest first.
    pub fn drain_available(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    /// Remove the first queued item satisfying `predicate`, if any.
    pub fn try_pop_matching<F>(&self, predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut items = self.lock();
        let index = items.iter().position(predicate)?;
        items.remove(index)
    }

    /// Wait up to `timeout` for an item satisfying `predicate`.
    ///
    /// Items already queued are considered first, then newly arriving
    /// ones in arrival order.
    pub async fn pop_matching<F>(&self, mut predicate: F, timeout: Duration) -> Result<T, TimedOut>
    where
        F: FnMut(&T) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before scanning so a push racing the
            // scan still wakes us.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if let Some(item) = self.try_pop_matching(&mut predicate) {
                return Ok(item);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self
                    .try_pop_matching(&mut predicate)
                    .ok_or(TimedOut { after: timeout });
            }
        }
    }

    /// Wait for the oldest item, however long it takes.
    pub async fn pop(&self) -> T {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();

            if let Some(item) = self.lock().pop_front() {
                return item;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn drain_preserves_order_and_empties() {
        let queue = MessageQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.drain_available(), vec![1, 2, 3]);
        assert!(queue.drain_available().is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn pop_matching_leaves_other_items_queued() {
        let queue = MessageQueue::new();
        queue.push("a");
        queue.push("b");
        queue.push("c");

        let item = queue
            .pop_matching(|s| *s == "b", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(item, "b");
        assert_eq!(queue.drain_available(), vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pop_matching_times_out() {
        let queue: MessageQueue<u32> = MessageQueue::new();
        queue.push(1);
        let err = queue
            .pop_matching(|n| *n == 2, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.after, Duration::from_secs(2));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn pop_matching_wakes_on_push() {
        let queue = Arc::new(MessageQueue::new());
        let producer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.push(10);
            producer.push(42);
        });

        let item = queue
            .pop_matching(|n| *n == 42, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(item, 42);
        assert_eq!(queue.drain_available(), vec![10]);
    }

    #[tokio::test]
    async fn pop_waits_for_first_item() {
        let queue = Arc::new(MessageQueue::new());
        let consumer = Arc::clone(&queue);
        let handle = tokio::spawn(async move { consumer.pop().await });
        tokio::task::yield_now().await;
        queue.push("first");
        assert_eq!(handle.await.unwrap(), "first");
    }
}
