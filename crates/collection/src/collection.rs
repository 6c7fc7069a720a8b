use crate::event::Event;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Type-erased handle used only to learn "something in this collection
/// changed" and "has this collection finished its initial population" —
/// the two facts a derived collection needs about its auxiliary inputs
/// without needing to know their element type.
pub trait AnyCollection: Send + Sync {
    fn ping(&self) -> broadcast::Receiver<()>;
    fn has_synced(&self) -> bool;
}

struct Inner<K, T> {
    items: RwLock<AHashMap<K, T>>,
    events: broadcast::Sender<Event<K, T>>,
    ping: broadcast::Sender<()>,
    synced: watch::Sender<bool>,
}

/// A keyed, observable set of `T`. Clones are cheap and share the same
/// underlying storage — this is the handle both producers and consumers
/// hold, per the "single owning collection, shared immutable reads"
/// ownership rule.
pub struct Collection<K, T> {
    inner: Arc<Inner<K, T>>,
}

impl<K, T> Clone for Collection<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, T> fmt::Debug for Collection<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").finish_non_exhaustive()
    }
}

impl<K, T> Collection<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (ping, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (synced, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                items: RwLock::new(AHashMap::new()),
                events,
                ping,
                synced,
            }),
        }
    }

    pub fn get(&self, key: &K) -> Option<T> {
        self.inner.items.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.items.read().contains_key(key)
    }

    pub fn list(&self) -> Vec<T> {
        self.inner.items.read().values().cloned().collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.items.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_synced(&self) -> bool {
        *self.inner.synced.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event<K, T>> {
        self.inner.events.subscribe()
    }

    pub fn watch_synced(&self) -> watch::Receiver<bool> {
        self.inner.synced.subscribe()
    }

    /// Insert or update `key`. Suppresses the event (and the write) when the
    /// new value is equal to what's stored — the equality contract that
    /// keeps downstream collections from re-running on no-op recomputes.
    pub fn apply(&self, key: K, value: T) -> bool {
        let mut items = self.inner.items.write();
        let event = match items.insert(key.clone(), value.clone()) {
            None => Some(Event::Added(key, value)),
            Some(prev) if prev != value => Some(Event::Updated(key, value)),
            Some(_) => None,
        };
        drop(items);
        if let Some(event) = event {
            let _ = self.inner.events.send(event);
            let _ = self.inner.ping.send(());
            true
        } else {
            false
        }
    }

    pub fn remove(&self, key: &K) -> bool {
        let removed = self.inner.items.write().remove(key);
        if removed.is_some() {
            let _ = self.inner.events.send(Event::Removed(key.clone()));
            let _ = self.inner.ping.send(());
            true
        } else {
            false
        }
    }

    pub fn mark_synced(&self) {
        let _ = self.inner.synced.send(true);
    }
}

impl<K, T> Default for Collection<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> AnyCollection for Collection<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn ping(&self) -> broadcast::Receiver<()> {
        self.inner.ping.subscribe()
    }

    fn has_synced(&self) -> bool {
        Collection::has_synced(self)
    }
}

/// Seeds a collection from a fixed set of items and marks it synced
/// immediately. Used in tests and for static configuration inputs.
pub fn static_collection<K, T>(items: Vec<(K, T)>) -> Collection<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let col = Collection::new();
    for (k, v) in items {
        col.apply(k, v);
    }
    col.mark_synced();
    col
}
