use crate::queue::WorkQueue;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

const IDLE_POLL: Duration = Duration::from_millis(25);

/// Bounded pool of workers draining a `WorkQueue`. Worker 0 blocks forever
/// on `dequeue` so there's always one warm worker; the rest poll and exit
/// once the queue has been empty for a little while, to avoid holding
/// `max_workers` tasks alive under light load.
pub struct WorkerPool;

impl WorkerPool {
    pub fn spawn<K, D, F, Fut>(queue: Arc<WorkQueue<K, D>>, max_workers: usize, apply: F)
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        D: Send + 'static,
        F: Fn(K, D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let apply = Arc::new(apply);
        let warm_queue = queue.clone();
        let warm_apply = apply.clone();
        tokio::spawn(async move {
            loop {
                let Some((target, data)) = warm_queue.dequeue().await else {
                    break;
                };
                warm_apply(target.clone(), data).await;
                warm_queue.mark_done(&target);
            }
        });

        for _ in 1..max_workers.max(1) {
            let queue = queue.clone();
            let apply = apply.clone();
            tokio::spawn(async move {
                loop {
                    if let Some((target, data)) = queue.try_dequeue() {
                        apply(target.clone(), data).await;
                        queue.mark_done(&target);
                        continue;
                    }
                    tokio::time::sleep(IDLE_POLL).await;
                    match queue.try_dequeue() {
                        Some((target, data)) => {
                            apply(target.clone(), data).await;
                            queue.mark_done(&target);
                        }
                        None => break,
                    }
                }
            });
        }
    }
}
