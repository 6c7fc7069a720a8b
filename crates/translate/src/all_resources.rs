use agentgateway_collection::{join, new_many_collection, AnyCollection, Collection};
use agentgateway_core::resource::{
    AgwResource, Backend, GatewayListener, NamespacedName, Policy, ResourcePayload, Route,
};
use std::sync::Arc;

/// Wraps a per-route-kind `Route` collection into the shared `AgwResource`
/// envelope, scoping each entry to the Gateway that owns its `listener_key`.
/// The `kind` prefix keeps keys from colliding across route kinds and
/// between routes, binds, listeners, backends, and policies once joined.
pub fn wrap_routes(
    kind: &'static str,
    routes: &Collection<String, Route>,
    gateway_listeners: &Collection<String, GatewayListener>,
) -> Collection<String, AgwResource> {
    let aux: Vec<Arc<dyn AnyCollection>> = vec![Arc::new(gateway_listeners.clone())];
    let gateway_listeners = gateway_listeners.clone();
    new_many_collection(routes, aux, move |key, route| {
        let gateway = route
            .listener_key
            .as_ref()
            .and_then(|lk| gateway_listeners.get(lk))
            .map(|l| l.parent_gateway);
        vec![(
            format!("route/{kind}/{key}"),
            AgwResource {
                resource: ResourcePayload::Route(route.clone()),
                gateway,
            },
        )]
    })
}

/// Flattens the `(Vec<Backend>, Vec<Policy>)` a backend plugin produces per
/// source object into the shared envelope. Backends and policies from
/// plugins are global (`gateway: None`) — visibility scoping is a property
/// of the Gateway they attach *through*, not of the backend itself.
pub fn wrap_plugin_outputs(
    plugin_outputs: &Collection<NamespacedName, (Vec<Backend>, Vec<Policy>)>,
) -> Collection<String, AgwResource> {
    new_many_collection(plugin_outputs, Vec::new(), move |_, (backends, policies)| {
        backends
            .iter()
            .map(|b| {
                (
                    format!("backend/{}", b.key),
                    AgwResource {
                        resource: ResourcePayload::Backend(b.clone()),
                        gateway: None,
                    },
                )
            })
            .chain(policies.iter().map(|p| {
                (
                    format!("policy/{}", p.key),
                    AgwResource {
                        resource: ResourcePayload::Policy(p.clone()),
                        gateway: None,
                    },
                )
            }))
            .collect()
    })
}

pub fn wrap_policies(policies: &Collection<String, Policy>) -> Collection<String, AgwResource> {
    new_many_collection(policies, Vec::new(), move |key, p| {
        vec![(
            format!("policy/{key}"),
            AgwResource {
                resource: ResourcePayload::Policy(p.clone()),
                gateway: None,
            },
        )]
    })
}

/// The final `Join`: the disjoint union of every resource-producing
/// collection, keyed by resource name. Every contributing collection
/// prefixes its own keys so duplicates across collections can't happen —
/// `join`'s duplicate-key detection is then a pure safety net.
pub fn all_resources(sources: Vec<Collection<String, AgwResource>>) -> Collection<String, AgwResource> {
    join(sources, false)
}
