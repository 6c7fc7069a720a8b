use crate::collection::AnyCollection;
use crate::engine::run_reactive_loop;
use crate::Collection;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::Arc;

/// `Index(col, keyFn)`: a secondary-key to primary-key multimap that stays
/// consistent as the underlying collection changes. `keyFn` may return
/// several secondary keys for one item (e.g. a GatewayListener indexed by
/// both its `ParentKey` and its internal name).
pub struct Index<SK, K> {
    inner: Arc<RwLock<AHashMap<SK, Vec<K>>>>,
}

impl<SK, K> Clone for Index<SK, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<SK, K> Index<SK, K>
where
    SK: Clone + Eq + Hash,
    K: Clone + Eq,
{
    pub fn get(&self, secondary: &SK) -> Vec<K> {
        self.inner
            .read()
            .get(secondary)
            .cloned()
            .unwrap_or_default()
    }
}

pub fn index_collection<K, T, SK>(
    source: &Collection<K, T>,
    key_fn: impl Fn(&T) -> Vec<SK> + Send + Sync + 'static,
) -> Index<SK, K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
    SK: Clone + Eq + Hash + Send + Sync + 'static,
{
    let by_secondary: Arc<RwLock<AHashMap<SK, Vec<K>>>> = Arc::new(RwLock::new(AHashMap::new()));
    let by_primary: Arc<RwLock<AHashMap<K, Vec<SK>>>> = Arc::new(RwLock::new(AHashMap::new()));
    let source_c = source.clone();
    let key_fn = Arc::new(key_fn);

    let reindex_one = {
        let by_secondary = by_secondary.clone();
        let by_primary = by_primary.clone();
        let source_c = source_c.clone();
        let key_fn = key_fn.clone();
        move |key: &K| {
            let mut by_primary_g = by_primary.write();
            let old_secondaries = by_primary_g.remove(key).unwrap_or_default();
            let mut by_secondary_g = by_secondary.write();
            for sk in &old_secondaries {
                if let Some(v) = by_secondary_g.get_mut(sk) {
                    v.retain(|k| k != key);
                    if v.is_empty() {
                        by_secondary_g.remove(sk);
                    }
                }
            }
            if let Some(item) = source_c.get(key) {
                let new_secondaries = key_fn(&item);
                for sk in &new_secondaries {
                    by_secondary_g.entry(sk.clone()).or_default().push(key.clone());
                }
                by_primary_g.insert(key.clone(), new_secondaries);
            }
        }
    };

    let reindex_key = reindex_one.clone();
    let recompute_key = move |key: K| reindex_key(&key);

    let source_all = source_c.clone();
    let reindex_all = reindex_one.clone();
    let recompute_all = move || {
        for key in source_all.keys() {
            reindex_all(&key);
        }
    };

    let aux: Vec<Arc<dyn AnyCollection>> = Vec::new();
    tokio::spawn(run_reactive_loop(
        source_c,
        aux,
        recompute_key,
        recompute_all,
        || {},
    ));

    Index {
        inner: by_secondary,
    }
}
