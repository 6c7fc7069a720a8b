use super::{build_parent_status, resolve_all_parents, resolve_backend_ref};
use crate::reference_grant::ReferenceGrantIndex;
use agentgateway_collection::{new_collection, new_many_collection, AnyCollection, Collection, Index};
use agentgateway_core::parent::ParentKey;
use agentgateway_core::resource::{GatewayListener, NamespacedName, Route};
use agentgateway_core::route::RouteAttachment;
use agentgateway_k8s_api::{AgwBackend, GrpcRoute, GrpcRouteStatus, ReferenceGrant, Service};
use std::sync::Arc;

const ROUTE_KIND: &str = "GRPCRoute";

fn aux(
    gateway_listeners: &Collection<String, GatewayListener>,
    grant_sources: &Collection<NamespacedName, ReferenceGrant>,
    services: &Collection<NamespacedName, Service>,
    backends: &Collection<NamespacedName, AgwBackend>,
) -> Vec<Arc<dyn AnyCollection>> {
    vec![
        Arc::new(gateway_listeners.clone()),
        Arc::new(grant_sources.clone()),
        Arc::new(services.clone()),
        Arc::new(backends.clone()),
    ]
}

/// One `Route` per rule per accepted listener (no per-match split, unlike
/// HTTPRoute).
pub fn grpc_route_resources(
    routes: &Collection<NamespacedName, GrpcRoute>,
    by_parent: Index<ParentKey, String>,
    gateway_listeners: Collection<String, GatewayListener>,
    grants: ReferenceGrantIndex,
    services: Collection<NamespacedName, Service>,
    backends: Collection<NamespacedName, AgwBackend>,
    grant_sources: Collection<NamespacedName, ReferenceGrant>,
) -> Collection<String, Route> {
    let aux = aux(&gateway_listeners, &grant_sources, &services, &backends);
    new_many_collection(routes, aux, move |key, route| {
        let hostnames: Vec<String> = route.spec.hostnames.clone().unwrap_or_default();
        let parent_refs = route.spec.inner.parent_refs.clone().unwrap_or_default();
        let resolutions = resolve_all_parents(
            key, ROUTE_KIND, &hostnames, true, &parent_refs, &by_parent, &gateway_listeners, &grants,
        );
        let accepted: Vec<_> = resolutions.iter().filter(|r| r.accepted()).collect();
        if accepted.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        for (rule_index, rule) in route.spec.rules.iter().flatten().enumerate() {
            let rule_name = rule.name.clone().unwrap_or_else(|| rule_index.to_string());
            let backend_list: Vec<_> = rule
                .backend_refs
                .iter()
                .flatten()
                .filter_map(|b| resolve_backend_ref(&key.namespace, ROUTE_KIND, b, None, &services, &backends, &grants))
                .collect();
            let matches = serde_json::to_value(&rule.matches).unwrap_or(serde_json::Value::Null);
            let filters = serde_json::to_value(&rule.filters).unwrap_or(serde_json::Value::Null);

            for listener in &accepted {
                let section = listener.parent_section.as_deref();
                let route_key = Route::key_for(&key.namespace, &key.name, rule_index, 0, section);
                out.push((
                    route_key.clone(),
                    Route {
                        key: route_key,
                        listener_key: Some(listener.internal_name.clone()),
                        rule_name: rule_name.clone(),
                        matches: matches.clone(),
                        filters: filters.clone(),
                        backends: backend_list.clone(),
                        hostnames: hostnames.clone(),
                    },
                ));
            }
        }
        out
    })
}

pub fn grpc_route_status(
    routes: &Collection<NamespacedName, GrpcRoute>,
    by_parent: Index<ParentKey, String>,
    gateway_listeners: Collection<String, GatewayListener>,
    grants: ReferenceGrantIndex,
    services: Collection<NamespacedName, Service>,
    backends: Collection<NamespacedName, AgwBackend>,
    grant_sources: Collection<NamespacedName, ReferenceGrant>,
    controller_name: String,
) -> Collection<NamespacedName, GrpcRouteStatus> {
    let aux = aux(&gateway_listeners, &grant_sources, &services, &backends);
    new_collection(routes, aux, move |key, route| {
        let hostnames: Vec<String> = route.spec.hostnames.clone().unwrap_or_default();
        let parent_refs = route.spec.inner.parent_refs.clone().unwrap_or_default();
        let resolutions = resolve_all_parents(
            key, ROUTE_KIND, &hostnames, true, &parent_refs, &by_parent, &gateway_listeners, &grants,
        );
        let all_backend_refs: Vec<_> = route.spec.rules.iter().flatten().flat_map(|r| r.backend_refs.iter().flatten()).collect();
        let resolved_refs = |_gw: &NamespacedName| {
            all_backend_refs
                .iter()
                .all(|b| resolve_backend_ref(&key.namespace, ROUTE_KIND, b, None, &services, &backends, &grants).is_some())
        };
        let parents = build_parent_status(&resolutions, &controller_name, resolved_refs);
        Some(GrpcRouteStatus {
            inner: agentgateway_k8s_api::RouteStatus { parents },
        })
    })
}

pub fn grpc_route_attachments(
    routes: &Collection<NamespacedName, GrpcRoute>,
    by_parent: Index<ParentKey, String>,
    gateway_listeners: Collection<String, GatewayListener>,
    grants: ReferenceGrantIndex,
) -> Collection<String, RouteAttachment> {
    let aux: Vec<Arc<dyn AnyCollection>> = vec![Arc::new(gateway_listeners.clone())];
    new_many_collection(routes, aux, move |key, route| {
        let hostnames: Vec<String> = route.spec.hostnames.clone().unwrap_or_default();
        let parent_refs = route.spec.inner.parent_refs.clone().unwrap_or_default();
        let resolutions = resolve_all_parents(
            key, ROUTE_KIND, &hostnames, true, &parent_refs, &by_parent, &gateway_listeners, &grants,
        );
        resolutions
            .into_iter()
            .filter(|r| r.accepted())
            .map(|r| {
                let attachment = RouteAttachment {
                    route: key.clone(),
                    route_kind: ROUTE_KIND.to_string(),
                    gateway: r.parent_gateway.clone(),
                    listener_name: r.parent_section.clone().unwrap_or_else(|| r.internal_name.clone()),
                };
                (format!("{}/{}/{}", key, r.parent_gateway, r.internal_name), attachment)
            })
            .collect()
    })
}
