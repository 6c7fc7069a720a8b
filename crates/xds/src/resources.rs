use agentgateway_collection::{Collection, Event};
use agentgateway_core::resource::{AgwResource, NamespacedName};
use ahash::{AHashMap, AHashSet};

/// The resource channel: every generator's output, keyed by resource name,
/// scoped to a Gateway when the resource is per-gateway and global
/// otherwise. Wraps the single joined `AgwResource` collection produced by
/// the translation pipeline.
#[derive(Clone)]
pub struct ResourceChannel {
    resources: Collection<String, AgwResource>,
}

impl ResourceChannel {
    pub fn new(resources: Collection<String, AgwResource>) -> Self {
        Self { resources }
    }

    /// All current resource names of `type_url` visible to `gateway`:
    /// `forGateway == None` resources are visible to every connection.
    pub fn names_for(&self, type_url: &str, gateway: &NamespacedName) -> AHashSet<String> {
        self.resources
            .list()
            .into_iter()
            .filter(|r| r.resource.type_url() == type_url)
            .filter(|r| r.gateway.as_ref().map_or(true, |g| g == gateway))
            .map(|r| r.resource.name().to_string())
            .collect()
    }

    /// Full snapshot for an initial (or wildcard) response: `(name, resource)`
    /// pairs of `type_url` visible to `gateway`.
    pub fn snapshot_for(&self, type_url: &str, gateway: &NamespacedName) -> Vec<AgwResource> {
        self.resources
            .list()
            .into_iter()
            .filter(|r| r.resource.type_url() == type_url)
            .filter(|r| r.gateway.as_ref().map_or(true, |g| g == gateway))
            .collect()
    }

    /// Looks a single changed name up first under `gateway/name`, then
    /// globally — the lookup order the push path uses to resolve a
    /// `ConfigsUpdated` entry to an actual resource (or a removal).
    pub fn resolve(&self, type_url: &str, name: &str, gateway: &NamespacedName) -> Option<AgwResource> {
        self.resources
            .get(name)
            .filter(|r| r.resource.type_url() == type_url)
            .filter(|r| r.gateway.as_ref().map_or(true, |g| g == gateway))
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event<String, AgwResource>> {
        self.resources.subscribe()
    }

    pub fn watch_synced(&self) -> tokio::sync::watch::Receiver<bool> {
        self.resources.watch_synced()
    }
}

/// `type_url -> changed resource names`, the unit the debouncer accumulates
/// and the push path consumes. Keys with an empty set never happen; a type
/// URL with no remaining changes is dropped from the map entirely.
pub type ConfigsUpdated = AHashMap<String, AHashSet<String>>;

pub fn union_configs_updated(into: &mut ConfigsUpdated, from: ConfigsUpdated) {
    for (type_url, names) in from {
        into.entry(type_url).or_default().extend(names);
    }
}
