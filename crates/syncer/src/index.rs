//! Adapts `agentgateway_collection::Collection` to the informer traits
//! `kubert::index` expects. Every namespaced CRD kind goes through the same
//! [`CollectionIndex`] wrapper; `GatewayClass` is the one cluster-scoped
//! input and has no `kubert::index` counterpart, so it gets its own watch
//! loop in [`watch_cluster_scoped`].

use agentgateway_collection::Collection;
use agentgateway_core::resource::NamespacedName;
use futures::Stream;
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use kubert::index::IndexNamespacedResource;
use std::collections::HashMap;
use tracing::{info, warn};

/// `kubert::index::namespaced` drives this through `apply`/`delete`/`reset`
/// as the informer's cache is built and kept in sync; each call is mirrored
/// onto the wrapped `Collection` unchanged.
pub struct CollectionIndex<T> {
    collection: Collection<NamespacedName, T>,
}

impl<T> CollectionIndex<T> {
    pub fn new(collection: Collection<NamespacedName, T>) -> Self {
        Self { collection }
    }
}

impl<T> IndexNamespacedResource<T> for CollectionIndex<T>
where
    T: Resource + Clone + PartialEq + Send + Sync + 'static,
    T::DynamicType: Default,
{
    fn apply(&mut self, obj: T) {
        let key = NamespacedName {
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
        };
        self.collection.apply(key, obj);
    }

    fn delete(&mut self, ns: String, name: String) {
        self.collection.remove(&NamespacedName { namespace: ns, name });
    }

    fn reset(&mut self, objs: Vec<T>, deleted: HashMap<String, std::collections::HashSet<String>>) {
        for (namespace, names) in deleted {
            for name in names {
                self.collection.remove(&NamespacedName { namespace: namespace.clone(), name });
            }
        }
        for obj in objs {
            self.apply(obj);
        }
        self.collection.mark_synced();
    }
}

/// `GatewayClass` is cluster-scoped, so it has no `namespace`/`name_any`
/// split and no `kubert::index::namespaced` entry point. Drives a
/// `Collection<String, T>` directly off a `kube::runtime::watcher` stream,
/// matching the variants `kubert::index::namespaced` itself switches on.
pub async fn watch_cluster_scoped<T>(
    collection: Collection<String, T>,
    stream: impl Stream<Item = watcher::Result<watcher::Event<T>>>,
    kind: &'static str,
) where
    T: Resource + Clone + Send + Sync + 'static,
{
    tokio::pin!(stream);
    use tokio_stream::StreamExt;
    loop {
        match stream.next().await {
            Some(Ok(watcher::Event::Apply(obj))) | Some(Ok(watcher::Event::InitApply(obj))) => {
                collection.apply(obj.name_any(), obj);
            }
            Some(Ok(watcher::Event::Delete(obj))) => {
                collection.remove(&obj.name_any());
            }
            Some(Ok(watcher::Event::Init)) => {}
            Some(Ok(watcher::Event::InitDone)) => {
                collection.mark_synced();
                info!(kind, "initial list complete");
            }
            Some(Err(error)) => {
                warn!(kind, %error, "watch error, retrying");
            }
            None => {
                warn!(kind, "watch stream ended");
                return;
            }
        }
    }
}
