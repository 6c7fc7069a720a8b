#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The status half of the pipeline (§4.3): every derived collection that
//! produces a status payload feeds a `WorkQueue`, drained by a bounded
//! `WorkerPool` that patches the live object's status subresource.
//!
//! This crate knows nothing about *which* kinds exist — callers wire one
//! `run_status_writer` per kind, passing the per-kind patch/merge logic as
//! a closure. The queueing, retry, and grace-period behavior is shared.

pub mod lease;
pub mod merge;
pub mod queue;
pub mod targets;
pub mod writer;
mod worker_pool;

pub use lease::{AlwaysLeader, WriteLease};
pub use queue::WorkQueue;
pub use targets::{
    apply_agw_backend_status, apply_gateway_status, apply_grpc_route_status, apply_http_route_status,
    apply_tcp_route_status, apply_tls_route_status, apply_traffic_policy_status, apply_xlistenerset_status,
};
pub use worker_pool::WorkerPool;
pub use writer::{apply_with_retry, get_and_patch_status, ApplyOutcome};

use agentgateway_collection::Collection;
use agentgateway_core::resource::NamespacedName;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_MAX_WORKERS: usize = 8;

/// Subscribes to a status collection's events, coalescing them through a
/// `WorkQueue`, and drives a `WorkerPool` that calls `apply` for each
/// (target, status) pair. `apply` is expected to call `apply_with_retry`
/// around a `get_and_patch_status` closure built from the live object.
pub fn run_status_writer<K, S, F, Fut>(
    status: Collection<K, S>,
    lease: Arc<dyn WriteLease>,
    max_workers: usize,
    apply: F,
) where
    K: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(K, S, Instant) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let queue: Arc<WorkQueue<K, (S, Instant)>> = Arc::new(WorkQueue::new());
    let first_seen_synced = Arc::new(AtomicBool::new(false));

    let pump_queue = queue.clone();
    tokio::spawn(async move {
        let mut rx = status.subscribe();
        // Seed the queue with the initial snapshot once synced, so a
        // writer that starts after the collection has already populated
        // doesn't wait for a spurious update to write the first status.
        let mut synced_rx = status.watch_synced();
        while !*synced_rx.borrow() {
            if synced_rx.changed().await.is_err() {
                return;
            }
        }
        for key in status.keys() {
            if let Some(value) = status.get(&key) {
                pump_queue.push(key, (value, Instant::now()));
            }
        }
        first_seen_synced.store(true, Ordering::SeqCst);

        while let Ok(event) = rx.recv().await {
            match event {
                agentgateway_collection::Event::Added(k, v) | agentgateway_collection::Event::Updated(k, v) => {
                    pump_queue.push(k, (v, Instant::now()));
                }
                agentgateway_collection::Event::Removed(_) => {
                    // Status writes follow the resource's own lifecycle;
                    // there's nothing to patch once the object is gone.
                }
            }
        }
    });

    let max_workers = if max_workers == 0 { DEFAULT_MAX_WORKERS } else { max_workers };
    WorkerPool::spawn(queue, max_workers, move |target, (data, first_attempt_at)| {
        let lease = lease.clone();
        let apply = &apply;
        let fut = apply(target, data, first_attempt_at);
        async move {
            if !lease.is_leader() {
                return;
            }
            fut.await;
        }
    });
}

/// Convenience key type alias used throughout the writer glue — every
/// status-producing collection in this system is keyed by the namespaced
/// name of its source object.
pub type Target = NamespacedName;
