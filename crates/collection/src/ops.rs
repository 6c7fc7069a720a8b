use crate::collection::AnyCollection;
use crate::engine::run_reactive_loop;
use crate::Collection;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;

/// `New[T]`: one output per primary input key, or none when `transform`
/// returns `None` (e.g. a candidate that fails reference resolution).
pub fn new_collection<K, P, Out>(
    primary: &Collection<K, P>,
    aux: Vec<Arc<dyn AnyCollection>>,
    transform: impl Fn(&K, &P) -> Option<Out> + Send + Sync + 'static,
) -> Collection<K, Out>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    P: Clone + PartialEq + Send + Sync + 'static,
    Out: Clone + PartialEq + Send + Sync + 'static,
{
    let output = Collection::new();
    let primary_c = primary.clone();
    let xform = Arc::new(transform);

    let out1 = output.clone();
    let primary1 = primary_c.clone();
    let xform1 = xform.clone();
    let recompute_key = move |key: K| match primary1.get(&key) {
        Some(p) => match xform1(&key, &p) {
            Some(out) => {
                out1.apply(key, out);
            }
            None => {
                out1.remove(&key);
            }
        },
        None => {
            out1.remove(&key);
        }
    };

    let out2 = output.clone();
    let primary2 = primary_c.clone();
    let xform2 = xform.clone();
    let recompute_all = move || {
        for key in primary2.keys() {
            if let Some(p) = primary2.get(&key) {
                match xform2(&key, &p) {
                    Some(out) => {
                        out2.apply(key, out);
                    }
                    None => {
                        out2.remove(&key);
                    }
                }
            }
        }
    };

    let out3 = output.clone();
    let mark_synced = move || out3.mark_synced();

    tokio::spawn(run_reactive_loop(
        primary_c,
        aux,
        recompute_key,
        recompute_all,
        mark_synced,
    ));

    output
}

/// `NewMany[T]`: zero or more outputs per primary input key, each with its
/// own key. The engine remembers which output keys a given primary key last
/// produced so it can retract ones that disappear on recompute.
pub fn new_many_collection<K, P, OK, Out>(
    primary: &Collection<K, P>,
    aux: Vec<Arc<dyn AnyCollection>>,
    transform: impl Fn(&K, &P) -> Vec<(OK, Out)> + Send + Sync + 'static,
) -> Collection<OK, Out>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    P: Clone + PartialEq + Send + Sync + 'static,
    OK: Clone + Eq + Hash + Send + Sync + 'static,
    Out: Clone + PartialEq + Send + Sync + 'static,
{
    let output = Collection::new();
    let primary_c = primary.clone();
    let xform = Arc::new(transform);
    let produced: Arc<Mutex<AHashMap<K, Vec<OK>>>> = Arc::new(Mutex::new(AHashMap::new()));

    let run_one = {
        let output = output.clone();
        let primary_c = primary_c.clone();
        let xform = xform.clone();
        let produced = produced.clone();
        move |key: &K| {
            let outputs = match primary_c.get(key) {
                Some(p) => xform(key, &p),
                None => Vec::new(),
            };
            let new_keys: Vec<OK> = outputs.iter().map(|(ok, _)| ok.clone()).collect();
            for (ok, out) in outputs {
                output.apply(ok, out);
            }
            let mut produced = produced.lock();
            if let Some(old_keys) = produced.insert(key.clone(), new_keys.clone()) {
                for old in old_keys {
                    if !new_keys.contains(&old) {
                        output.remove(&old);
                    }
                }
            }
            if new_keys.is_empty() {
                produced.remove(key);
            }
        }
    };

    let run_one_key = run_one.clone();
    let recompute_key = move |key: K| run_one_key(&key);

    let primary_all = primary_c.clone();
    let run_one_all = run_one.clone();
    let recompute_all = move || {
        for key in primary_all.keys() {
            run_one_all(&key);
        }
    };

    let out3 = output.clone();
    let mark_synced = move || out3.mark_synced();

    tokio::spawn(run_reactive_loop(
        primary_c,
        aux,
        recompute_key,
        recompute_all,
        mark_synced,
    ));

    output
}

/// `NewStatus[T,S]`: like `New`, but the transform also reports a status
/// payload for the primary key, delivered on a separate collection so the
/// status writer (C3) can subscribe without coupling to the resource shape.
pub fn new_status_collection<K, P, Out, S>(
    primary: &Collection<K, P>,
    aux: Vec<Arc<dyn AnyCollection>>,
    transform: impl Fn(&K, &P) -> (Option<Out>, S) + Send + Sync + 'static,
) -> (Collection<K, Out>, Collection<K, S>)
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    P: Clone + PartialEq + Send + Sync + 'static,
    Out: Clone + PartialEq + Send + Sync + 'static,
    S: Clone + PartialEq + Send + Sync + 'static,
{
    let resources = Collection::new();
    let status = Collection::new();
    let primary_c = primary.clone();
    let xform = Arc::new(transform);

    let run_one = {
        let resources = resources.clone();
        let status = status.clone();
        let primary_c = primary_c.clone();
        let xform = xform.clone();
        move |key: &K| match primary_c.get(key) {
            Some(p) => {
                let (out, s) = xform(key, &p);
                match out {
                    Some(out) => {
                        resources.apply(key.clone(), out);
                    }
                    None => {
                        resources.remove(key);
                    }
                }
                status.apply(key.clone(), s);
            }
            None => {
                resources.remove(key);
                status.remove(key);
            }
        }
    };

    let run_one_key = run_one.clone();
    let recompute_key = move |key: K| run_one_key(&key);

    let primary_all = primary_c.clone();
    let run_one_all = run_one.clone();
    let recompute_all = move || {
        for key in primary_all.keys() {
            run_one_all(&key);
        }
    };

    let resources3 = resources.clone();
    let status3 = status.clone();
    let mark_synced = move || {
        resources3.mark_synced();
        status3.mark_synced();
    };

    tokio::spawn(run_reactive_loop(
        primary_c,
        aux,
        recompute_key,
        recompute_all,
        mark_synced,
    ));

    (resources, status)
}

/// `Map(col, fn)`: a pure 1:1 rewrite with no auxiliary inputs.
pub fn map_collection<K, In, Out>(
    source: &Collection<K, In>,
    f: impl Fn(&In) -> Out + Send + Sync + 'static,
) -> Collection<K, Out>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    In: Clone + PartialEq + Send + Sync + 'static,
    Out: Clone + PartialEq + Send + Sync + 'static,
{
    new_collection(source, Vec::new(), move |_, v| Some(f(v)))
}

/// `Join(cols...)`: the disjoint union of same-keyed, same-typed
/// collections. A key present in more than one input is a hard error
/// unless `unchecked` is set, matching the "duplicates rejected" contract.
pub fn join<K, T>(sources: Vec<Collection<K, T>>, unchecked: bool) -> Collection<K, T>
where
    K: Clone + Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let output = Collection::new();
    for source in &sources {
        let aux: Vec<Arc<dyn AnyCollection>> = Vec::new();
        let out = output.clone();
        let owner = source.clone();
        let recompute_key = move |key: K| match owner.get(&key) {
            Some(v) => {
                if !unchecked {
                    if let Some(existing) = out.get(&key) {
                        if existing != v {
                            tracing::warn!(?key, "join: duplicate key across sources, ignoring");
                            return;
                        }
                    }
                }
                out.apply(key, v);
            }
            None => {
                out.remove(&key);
            }
        };
        let out_all = output.clone();
        let owner_all = source.clone();
        let recompute_all = move || {
            for key in owner_all.keys() {
                if let Some(v) = owner_all.get(&key) {
                    out_all.apply(key, v);
                }
            }
        };
        let mark_synced = || {};
        tokio::spawn(run_reactive_loop(
            source.clone(),
            aux,
            recompute_key,
            recompute_all,
            mark_synced,
        ));
    }

    let out_sync = output.clone();
    let sources_sync = sources.clone();
    tokio::spawn(async move {
        for source in &sources_sync {
            let mut rx = source.watch_synced();
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
        out_sync.mark_synced();
    });

    output
}
