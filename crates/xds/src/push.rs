use crate::connection::Connection;
use crate::resources::{union_configs_updated, ConfigsUpdated};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Per-connection push coalescing queue. Re-enqueuing a connection already
/// pending merges the new `ConfigsUpdated` into the existing one; enqueuing
/// a connection currently being sent to stores the update and it is
/// re-queued once that send's `mark_done` runs — the same latest-wins shape
/// as the status writer's work queue, but merging instead of replacing,
/// since a push can carry updates for several type URLs at once.
pub struct PushQueue {
    state: Mutex<State>,
    notify: Notify,
}

struct State {
    order: VecDeque<u64>,
    pending: AHashMap<u64, (Arc<Connection>, ConfigsUpdated)>,
    processing: AHashMap<u64, Arc<Connection>>,
    reenqueue: AHashMap<u64, ConfigsUpdated>,
    closed: bool,
}

impl PushQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                order: VecDeque::new(),
                pending: AHashMap::default(),
                processing: AHashMap::default(),
                reenqueue: AHashMap::default(),
                closed: false,
            }),
            notify: Notify::new(),
        })
    }

    pub fn push(&self, conn: Arc<Connection>, update: ConfigsUpdated) {
        let mut state = self.state.lock();
        let id = conn.id;
        if state.processing.contains_key(&id) {
            match state.reenqueue.get_mut(&id) {
                Some(merged) => union_configs_updated(merged, update),
                None => {
                    state.reenqueue.insert(id, update);
                }
            }
            return;
        }
        match state.pending.get_mut(&id) {
            Some((_, merged)) => union_configs_updated(merged, update),
            None => {
                state.pending.insert(id, (conn, update));
                state.order.push_back(id);
            }
        }
        drop(state);
        self.notify.notify_one();
    }

    /// Broadcasts every connection currently registered for a fresh push —
    /// used once on each Debouncer flush since a resource change might be
    /// relevant to any connection.
    pub fn push_all(&self, connections: &[Arc<Connection>], update: ConfigsUpdated) {
        for conn in connections {
            self.push(conn.clone(), update.clone());
        }
    }

    pub async fn dequeue(&self) -> Option<(Arc<Connection>, ConfigsUpdated)> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(id) = state.order.pop_front() {
                    let (conn, update) = state.pending.remove(&id).expect("order/pending in sync");
                    state.processing.insert(id, conn.clone());
                    return Some((conn, update));
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn mark_done(&self, id: u64) {
        let mut state = self.state.lock();
        let conn = state.processing.remove(&id);
        if let Some(update) = state.reenqueue.remove(&id) {
            if let Some((_, pending_update)) = state.pending.get_mut(&id) {
                union_configs_updated(pending_update, update);
            } else if let Some(conn) = conn {
                state.pending.insert(id, (conn, update));
                state.order.push_back(id);
                drop(state);
                self.notify.notify_one();
            }
        }
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }
}

/// Runs `send` for every dequeued push, bounded to `concurrency` concurrent
/// sends via a semaphore; the slot is released when the connection's own
/// send future completes, matching the "release on MarkDone" rule.
pub fn spawn_sender_pool<F, Fut>(queue: Arc<PushQueue>, concurrency: usize, send: F)
where
    F: Fn(Arc<Connection>, ConfigsUpdated) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let send = Arc::new(send);
    tokio::spawn(async move {
        while let Some((conn, update)) = queue.dequeue().await {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let send = send.clone();
            let queue = queue.clone();
            let id = conn.id;
            tokio::spawn(async move {
                send(conn, update).await;
                queue.mark_done(id);
                drop(permit);
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgateway_core::resource::NamespacedName;
    use ahash::AHashSet;

    fn updated(type_url: &str, name: &str) -> ConfigsUpdated {
        let mut map = ConfigsUpdated::default();
        map.insert(type_url.to_string(), AHashSet::from_iter([name.to_string()]));
        map
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_during_processing_is_redelivered_after_mark_done() {
        let queue = PushQueue::new();
        let conn = Connection::new(NamespacedName::new("default", "gw"));

        queue.push(conn.clone(), updated("type.a", "r1"));
        let (dequeued, first) = queue.dequeue().await.unwrap();
        assert_eq!(dequeued.id, conn.id);
        assert!(first["type.a"].contains("r1"));

        queue.push(conn.clone(), updated("type.a", "r2"));
        queue.mark_done(conn.id);

        let (_, second) = queue.dequeue().await.unwrap();
        assert!(second["type.a"].contains("r2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_pushes_while_pending_merge_type_urls() {
        let queue = PushQueue::new();
        let conn = Connection::new(NamespacedName::new("default", "gw"));

        queue.push(conn.clone(), updated("type.a", "r1"));
        queue.push(conn.clone(), updated("type.b", "r2"));

        let (_, merged) = queue.dequeue().await.unwrap();
        assert!(merged["type.a"].contains("r1"));
        assert!(merged["type.b"].contains("r2"));
    }
}
