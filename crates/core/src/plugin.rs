use crate::error::TranslationError;
use crate::resource::{Backend, Policy};
use std::collections::HashMap;

/// A `(group, kind)` pair identifying a vendor CRD a plugin owns.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PluginKey {
    pub group: String,
    pub kind: String,
}

impl PluginKey {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

/// Result of translating one source object: the resources it produces plus
/// the status payload to stamp back onto it. Plugins never fail outright —
/// a translation error is carried alongside whatever resources could still
/// be produced.
pub struct PluginOutput<S> {
    pub backends: Vec<Backend>,
    pub policies: Vec<Policy>,
    pub status: S,
    pub error: Option<TranslationError>,
}

/// A pure function pair translating a vendor CRD instance, keyed by
/// `(group, kind)`. Plugins never retain state between calls; all context
/// they need is passed in `Ctx`.
pub trait BackendPlugin<Ctx, Source, Status>: Send + Sync {
    fn translate(&self, ctx: &Ctx, source: &Source) -> PluginOutput<Status>;
}

/// Closed-set registry of plugins. Registering the same `(group, kind)`
/// twice is a programmer error, not a runtime condition.
pub struct PluginRegistry<P> {
    plugins: HashMap<PluginKey, P>,
}

impl<P> Default for PluginRegistry<P> {
    fn default() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }
}

impl<P> PluginRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics if `key` is already registered — a duplicate plugin
    /// registration is a hard startup error, not a recoverable condition.
    pub fn register(&mut self, key: PluginKey, plugin: P) {
        if self.plugins.insert(key.clone(), plugin).is_some() {
            panic!(
                "duplicate plugin registration for {}/{}",
                key.group, key.kind
            );
        }
    }

    pub fn get(&self, key: &PluginKey) -> Option<&P> {
        self.plugins.get(key)
    }
}
