#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A small derived-collection engine: a DAG of keyed, observable sets where
//! each node recomputes incrementally as its inputs change.
//!
//! There is no dynamic `ctx.Fetch` registry here — transforms close over
//! the typed collections they read (a plain Rust closure capture), and the
//! caller separately lists those same collections as `aux` inputs so the
//! engine knows to re-trigger the transform when they change. A primary
//! input event still only recomputes the one affected key; an auxiliary
//! input change recomputes every key. That asymmetry is deliberate — the
//! dominant fan-out in this system is per-route, and routes are always the
//! primary input of their own collection.

mod collection;
mod engine;
mod event;
mod index;
mod ops;

pub use collection::{static_collection, AnyCollection, Collection};
pub use event::Event;
pub use index::{index_collection, Index};
pub use ops::{join, map_collection, new_collection, new_many_collection, new_status_collection};

use std::sync::Arc;

/// Blocks until every named collection reports synced. Used at the process
/// boundary (readiness probes, end-to-end tests) rather than inside a
/// transform, which must never block on anything but in-memory reads.
pub async fn wait_all_synced(collections: &[Arc<dyn AnyCollection>]) {
    loop {
        if collections.iter().all(|c| c.has_synced()) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn new_collection_suppresses_equal_reemission() {
        let source: Collection<String, i32> = Collection::new();
        let doubled = new_collection(&source, Vec::new(), |_, v| Some(v * 2));

        let mut events = doubled.subscribe();
        source.apply("a".into(), 1);
        source.mark_synced();

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if doubled.get(&"a".to_string()) == Some(2) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("doubled value observed");

        // Re-applying the same source value must not re-emit downstream.
        source.apply("a".into(), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(events.try_recv().is_err(), "no spurious event expected");
    }

    #[tokio::test]
    async fn new_many_collection_retracts_stale_outputs() {
        let source: Collection<String, Vec<i32>> = Collection::new();
        let expanded = new_many_collection(&source, Vec::new(), |k, v| {
            v.iter()
                .enumerate()
                .map(|(i, n)| (format!("{k}.{i}"), *n))
                .collect()
        });

        source.apply("r".into(), vec![1, 2, 3]);
        source.mark_synced();
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if expanded.len() == 3 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        source.apply("r".into(), vec![9]);
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if expanded.len() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(expanded.get(&"r.0".to_string()), Some(9));
    }

    #[tokio::test]
    async fn index_stays_consistent_across_updates() {
        let source: Collection<String, String> = Collection::new();
        let idx = index_collection(&source, |v: &String| vec![v.clone()]);

        source.apply("a".into(), "x".into());
        source.mark_synced();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(idx.get(&"x".to_string()), vec!["a".to_string()]);

        source.apply("a".into(), "y".into());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(idx.get(&"x".to_string()).is_empty());
        assert_eq!(idx.get(&"y".to_string()), vec!["a".to_string()]);
    }
}
