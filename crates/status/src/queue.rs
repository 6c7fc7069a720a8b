use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Notify;

struct State<K, D> {
    order: VecDeque<K>,
    pending: AHashMap<K, D>,
    processing: AHashSet<K>,
    reenqueue: AHashMap<K, D>,
    closed: bool,
}

/// Latest-wins coalescing queue: a target already pending has its data
/// replaced in place; a target currently being processed has its new data
/// held back until `mark_done` decides whether to re-queue.
pub struct WorkQueue<K, D> {
    state: Mutex<State<K, D>>,
    notify: Arc<Notify>,
}

impl<K, D> WorkQueue<K, D>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                order: VecDeque::new(),
                pending: AHashMap::new(),
                processing: AHashSet::new(),
                reenqueue: AHashMap::new(),
                closed: false,
            }),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn push(&self, target: K, data: D) {
        let mut state = self.state.lock();
        if state.processing.contains(&target) {
            state.reenqueue.insert(target, data);
            return;
        }
        if state.pending.insert(target.clone(), data).is_none() {
            state.order.push_back(target);
        }
        drop(state);
        self.notify.notify_one();
    }

    /// Blocks until an item is available or the queue is closed.
    pub async fn dequeue(&self) -> Option<(K, D)> {
        loop {
            {
                let mut state = self.state.lock();
                while let Some(target) = state.order.pop_front() {
                    if let Some(data) = state.pending.remove(&target) {
                        state.processing.insert(target.clone());
                        return Some((target, data));
                    }
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Marks `target` no longer processing. If a push arrived while it was
    /// being worked, re-queues it immediately with the newer data.
    pub fn mark_done(&self, target: &K) {
        let mut state = self.state.lock();
        state.processing.remove(target);
        if let Some(data) = state.reenqueue.remove(target) {
            state.pending.insert(target.clone(), data);
            state.order.push_back(target.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Non-blocking variant of `dequeue`, used by workers that exit rather
    /// than block when the queue is empty.
    pub fn try_dequeue(&self) -> Option<(K, D)> {
        let mut state = self.state.lock();
        while let Some(target) = state.order.pop_front() {
            if let Some(data) = state.pending.remove(&target) {
                state.processing.insert(target.clone());
                return Some((target, data));
            }
        }
        None
    }
}

impl<K, D> Default for WorkQueue<K, D>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_push_replaces_in_place() {
        let q: WorkQueue<String, i32> = WorkQueue::new();
        q.push("a".to_string(), 1);
        q.push("a".to_string(), 2);
        let (k, v) = q.dequeue().await.unwrap();
        assert_eq!(k, "a");
        assert_eq!(v, 2);
    }

    #[tokio::test]
    async fn push_during_processing_is_redelivered_after_mark_done() {
        let q: WorkQueue<String, i32> = WorkQueue::new();
        q.push("a".to_string(), 1);
        let (k, v) = q.dequeue().await.unwrap();
        assert_eq!(v, 1);
        q.push("a".to_string(), 2);
        q.mark_done(&k);
        let (k2, v2) = q.dequeue().await.unwrap();
        assert_eq!(k2, "a");
        assert_eq!(v2, 2);
    }

    #[tokio::test]
    async fn mark_done_with_no_pending_push_drops_the_entry() {
        let q: WorkQueue<String, i32> = WorkQueue::new();
        q.push("a".to_string(), 1);
        let (k, _) = q.dequeue().await.unwrap();
        q.mark_done(&k);

        let q = Arc::new(q);
        let q2 = q.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            q2.close();
        });
        assert!(q.dequeue().await.is_none());
    }
}
