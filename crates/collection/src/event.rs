/// A change notification for one key of a collection. Consumers of a
/// collection's raw event stream see exactly these three shapes; batching
/// across keys is left to the subscriber.
#[derive(Clone, Debug)]
pub enum Event<K, T> {
    Added(K, T),
    Updated(K, T),
    Removed(K),
}

impl<K: Clone, T> Event<K, T> {
    pub fn key(&self) -> &K {
        match self {
            Event::Added(k, _) | Event::Updated(k, _) | Event::Removed(k) => k,
        }
    }
}
