use crate::collection::AnyCollection;
use crate::event::Event;
use crate::Collection;
use futures::stream::{select_all, StreamExt};
use std::hash::Hash;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

/// Drives one derived collection's lifetime: replays the primary input's
/// current contents, waits for every input (primary and auxiliary) to
/// report synced before declaring itself synced, then services events for
/// as long as the primary input's channel stays open.
///
/// `recompute_key` re-runs the transform for a single primary key — the
/// path taken for ordinary primary-input churn, which is what keeps a
/// high-fanout input (many HTTPRoutes) from forcing a full rescan.
/// `recompute_all` re-runs the transform for every known primary key — the
/// path taken when an auxiliary input changes, since the engine has no
/// fine-grained dependency tracking between a primary key and the
/// auxiliary items its last transform happened to read.
pub(crate) async fn run_reactive_loop<K, P, RK, RA, MS>(
    primary: Collection<K, P>,
    aux: Vec<Arc<dyn AnyCollection>>,
    recompute_key: RK,
    recompute_all: RA,
    mark_synced: MS,
) where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    P: Clone + PartialEq + Send + Sync + 'static,
    RK: Fn(K) + Send + 'static,
    RA: Fn() + Send + 'static,
    MS: Fn() + Send + 'static,
{
    let mut primary_events = BroadcastStream::new(primary.subscribe());

    for key in primary.keys() {
        recompute_key(key);
    }
    recompute_all();

    let mut synced_rx = primary.watch_synced();
    while !*synced_rx.borrow() {
        if synced_rx.changed().await.is_err() {
            return;
        }
    }
    for a in &aux {
        let mut ready = a.has_synced();
        if !ready {
            let mut pings = BroadcastStream::new(a.ping());
            while !ready {
                ready = a.has_synced();
                if ready {
                    break;
                }
                if pings.next().await.is_none() {
                    break;
                }
            }
        }
    }
    mark_synced();

    let mut aux_pings = select_all(aux.iter().map(|a| BroadcastStream::new(a.ping())));
    loop {
        tokio::select! {
            ev = primary_events.next() => match ev {
                Some(Ok(event)) => recompute_key(event_key(event)),
                Some(Err(_lagged)) => recompute_all(),
                None => return,
            },
            ping = aux_pings.next(), if !aux.is_empty() => {
                if ping.is_some() {
                    recompute_all();
                }
            },
        }
    }
}

fn event_key<K: Clone, T>(event: Event<K, T>) -> K {
    match event {
        Event::Added(k, _) | Event::Updated(k, _) | Event::Removed(k) => k,
    }
}
