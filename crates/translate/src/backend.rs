use agentgateway_collection::{new_status_collection, Collection};
use agentgateway_core::plugin::{BackendPlugin, PluginKey, PluginOutput, PluginRegistry};
use agentgateway_core::resource::{Backend, NamespacedName, Policy};
use agentgateway_k8s_api::{AgwBackend, AgwBackendStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use std::sync::Arc;

/// Context passed to every backend/policy plugin. Plugins are pure
/// functions of `(ctx, source)` — no hidden state, no I/O.
pub struct PolicyCtx {
    pub controller_name: String,
}

/// The built-in plugin for the vendor `Backend` CRD: forwards the opaque
/// payload through unchanged. Other `(group, kind)` pairs (AI providers, MCP
/// targets, inference pools) register their own plugin the same way.
pub struct AgwBackendPlugin;

impl BackendPlugin<PolicyCtx, AgwBackend, AgwBackendStatus> for AgwBackendPlugin {
    fn translate(&self, ctx: &PolicyCtx, source: &AgwBackend) -> PluginOutput<AgwBackendStatus> {
        let namespace = source.metadata.namespace.clone().unwrap_or_default();
        let name = source.metadata.name.clone().unwrap_or_default();
        let key = NamespacedName::new(namespace, name);
        let backend = Backend {
            key: key.clone(),
            payload: source.spec.payload.clone(),
        };
        let _ = &ctx.controller_name;
        PluginOutput {
            backends: vec![backend],
            policies: Vec::new(),
            status: AgwBackendStatus {
                conditions: Some(vec![Condition {
                    type_: "Accepted".to_string(),
                    status: "True".to_string(),
                    reason: "Accepted".to_string(),
                    message: "backend accepted".to_string(),
                    observed_generation: None,
                    last_transition_time: k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
                        chrono::DateTime::UNIX_EPOCH,
                    ),
                }]),
            },
            error: None,
        }
    }
}

pub type AgwBackendRegistry = PluginRegistry<Box<dyn BackendPlugin<PolicyCtx, AgwBackend, AgwBackendStatus>>>;

pub fn default_backend_registry() -> AgwBackendRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(
        PluginKey::new("agentgateway.dev", "Backend"),
        Box::new(AgwBackendPlugin) as Box<dyn BackendPlugin<PolicyCtx, AgwBackend, AgwBackendStatus>>,
    );
    registry
}

/// Runs every `AgwBackend` through the plugin registered for its
/// `(group, kind)`. There is exactly one source kind feeding this
/// collection today, so the lookup key is fixed; a second vendor backend
/// kind would get its own `Inputs` field and its own call to this function.
pub fn backend_resources(
    backends: &Collection<NamespacedName, AgwBackend>,
    registry: Arc<AgwBackendRegistry>,
    ctx: Arc<PolicyCtx>,
) -> (
    Collection<NamespacedName, (Vec<Backend>, Vec<Policy>)>,
    Collection<NamespacedName, AgwBackendStatus>,
) {
    let key = PluginKey::new("agentgateway.dev", "Backend");
    new_status_collection(backends, Vec::new(), move |_, source| {
        match registry.get(&key) {
            Some(plugin) => {
                let out = plugin.translate(&ctx, source);
                (Some((out.backends, out.policies)), out.status)
            }
            None => (
                None,
                AgwBackendStatus {
                    conditions: Some(vec![Condition {
                        type_: "Accepted".to_string(),
                        status: "False".to_string(),
                        reason: "NoPluginRegistered".to_string(),
                        message: "no plugin owns this backend kind".to_string(),
                        observed_generation: None,
                        last_transition_time: k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
                            chrono::DateTime::UNIX_EPOCH,
                        ),
                    }]),
                },
            ),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_plugin_registration_panics() {
        let mut registry: AgwBackendRegistry = PluginRegistry::new();
        registry.register(
            PluginKey::new("agentgateway.dev", "Backend"),
            Box::new(AgwBackendPlugin),
        );
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            registry.register(PluginKey::new("agentgateway.dev", "Backend"), Box::new(AgwBackendPlugin));
        }));
        assert!(result.is_err());
    }
}
