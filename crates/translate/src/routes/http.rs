use super::{build_parent_status, resolve_all_parents, resolve_backend_ref};
use crate::reference_grant::ReferenceGrantIndex;
use agentgateway_collection::{new_collection, new_many_collection, AnyCollection, Collection};
use agentgateway_core::parent::ParentKey;
use agentgateway_core::resource::{NamespacedName, Route};
use agentgateway_core::route::RouteAttachment;
use agentgateway_k8s_api::{AgwBackend, HttpRoute, HttpRouteStatus, Service};
use agentgateway_collection::Index;
use std::sync::Arc;

const ROUTE_KIND: &str = "HTTPRoute";

fn aux(
    gateway_listeners: &Collection<String, agentgateway_core::resource::GatewayListener>,
    grant_sources: &Collection<NamespacedName, agentgateway_k8s_api::ReferenceGrant>,
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

/// Splits each rule into one `Route` per (rule, match, accepted listener).
pub fn http_route_resources(
    routes: &Collection<NamespacedName, HttpRoute>,
    by_parent: Index<ParentKey, String>,
    gateway_listeners: Collection<String, agentgateway_core::resource::GatewayListener>,
    grants: ReferenceGrantIndex,
    services: Collection<NamespacedName, Service>,
    backends: Collection<NamespacedName, AgwBackend>,
    grant_sources: Collection<NamespacedName, agentgateway_k8s_api::ReferenceGrant>,
) -> Collection<String, Route> {
    let aux = aux(&gateway_listeners, &grant_sources, &services, &backends);
    new_many_collection(routes, aux, move |key, route| {
        let hostnames: Vec<String> = route.spec.hostnames.clone().unwrap_or_default();
        let parent_refs = route.spec.inner.parent_refs.clone().unwrap_or_default();
        let resolutions = resolve_all_parents(
            key,
            ROUTE_KIND,
            &hostnames,
            true,
            &parent_refs,
            &by_parent,
            &gateway_listeners,
            &grants,
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
                .filter_map(|b| {
                    resolve_backend_ref(
                        &key.namespace,
                        ROUTE_KIND,
                        &b.backend_ref,
                        b.weight,
                        &services,
                        &backends,
                        &grants,
                    )
                })
                .collect();
            let matches = rule.matches.clone().unwrap_or_default();
            let match_list = if matches.is_empty() {
                vec![serde_json::Value::Null]
            } else {
                matches.into_iter().map(|m| serde_json::to_value(m).unwrap_or(serde_json::Value::Null)).collect()
            };
            let filters = serde_json::to_value(&rule.filters).unwrap_or(serde_json::Value::Null);

            for (match_index, matched) in match_list.into_iter().enumerate() {
                for listener in &accepted {
                    let section = listener.parent_section.as_deref();
                    let route_key = Route::key_for(&key.namespace, &key.name, rule_index, match_index, section);
                    out.push((
                        route_key.clone(),
                        Route {
                            key: route_key,
                            listener_key: Some(listener.internal_name.clone()),
                            rule_name: rule_name.clone(),
                            matches: matched.clone(),
                            filters: filters.clone(),
                            backends: backend_list.clone(),
                            hostnames: hostnames.clone(),
                        },
                    ));
                }
            }
        }
        out
    })
}

/// One `RouteParentStatus` per referenced Gateway, aggregated across all of
/// that Gateway's listeners.
pub fn http_route_status(
    routes: &Collection<NamespacedName, HttpRoute>,
    by_parent: Index<ParentKey, String>,
    gateway_listeners: Collection<String, agentgateway_core::resource::GatewayListener>,
    grants: ReferenceGrantIndex,
    services: Collection<NamespacedName, Service>,
    backends: Collection<NamespacedName, AgwBackend>,
    grant_sources: Collection<NamespacedName, agentgateway_k8s_api::ReferenceGrant>,
    controller_name: String,
) -> Collection<NamespacedName, HttpRouteStatus> {
    let aux = aux(&gateway_listeners, &grant_sources, &services, &backends);
    new_collection(routes, aux, move |key, route| {
        let hostnames: Vec<String> = route.spec.hostnames.clone().unwrap_or_default();
        let parent_refs = route.spec.inner.parent_refs.clone().unwrap_or_default();
        let resolutions = resolve_all_parents(
            key,
            ROUTE_KIND,
            &hostnames,
            true,
            &parent_refs,
            &by_parent,
            &gateway_listeners,
            &grants,
        );

        let all_backend_refs: Vec<_> = route
            .spec
            .rules
            .iter()
            .flatten()
            .flat_map(|r| r.backend_refs.iter().flatten())
            .collect();
        let resolved_refs = |_gw: &NamespacedName| {
            all_backend_refs.iter().all(|b| {
                resolve_backend_ref(&key.namespace, ROUTE_KIND, &b.backend_ref, b.weight, &services, &backends, &grants).is_some()
            })
        };

        let parents = build_parent_status(&resolutions, &controller_name, resolved_refs);
        Some(HttpRouteStatus {
            inner: agentgateway_k8s_api::RouteStatus { parents },
        })
    })
}

/// One entry per (route, accepted listener), independent of rule fan-out —
/// feeds the Gateway listener `attachedRoutes` counter.
pub fn http_route_attachments(
    routes: &Collection<NamespacedName, HttpRoute>,
    by_parent: Index<ParentKey, String>,
    gateway_listeners: Collection<String, agentgateway_core::resource::GatewayListener>,
    grants: ReferenceGrantIndex,
) -> Collection<String, RouteAttachment> {
    let aux: Vec<Arc<dyn AnyCollection>> = vec![Arc::new(gateway_listeners.clone())];
    new_many_collection(routes, aux, move |key, route| {
        let hostnames: Vec<String> = route.spec.hostnames.clone().unwrap_or_default();
        let parent_refs = route.spec.inner.parent_refs.clone().unwrap_or_default();
        let resolutions = resolve_all_parents(
            key,
            ROUTE_KIND,
            &hostnames,
            true,
            &parent_refs,
            &by_parent,
            &gateway_listeners,
            &grants,
        );
        resolutions
            .into_iter()
            .filter(|r| r.accepted())
            .map(|r| {
                let attachment = RouteAttachment {
                    route: key.clone(),
                    route_kind: ROUTE_KIND.to_string(),
                    gateway: r.parent_gateway.clone(),
                    listener_name: r
                        .parent_section
                        .clone()
                        .unwrap_or_else(|| r.internal_name.clone()),
                };
                (
                    format!("{}/{}/{}", key, r.parent_gateway, r.internal_name),
                    attachment,
                )
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_grant::reference_grant_index;
    use agentgateway_collection::{index_collection, static_collection};
    use agentgateway_core::parent::{ListenerProtocol, ParentInfo, ParentKey, ParentKind};
    use agentgateway_k8s_api::{
        BackendObjectReference, CommonRouteSpec, HttpBackendRef, HttpRouteRule, HttpRouteSpec,
        ParentReference,
    };
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn happy_path_single_gateway_single_backend() {
        let gw = NamespacedName::new("default", "gw");
        let route_ref = NamespacedName::new("default", "r");

        let listener_key = ParentInfo {
            parent_key: ParentKey::new(ParentKind::Gateway, "default", "gw"),
            section_name: "http".to_string(),
            port: 80,
            protocol: ListenerProtocol::Http,
            hostnames: Vec::new(),
            allowed_route_kinds: vec!["HTTPRoute".to_string()],
            namespaces_from: "Same".to_string(),
            tls_passthrough: false,
        };
        let gw_listener = GatewayListener {
            name: "http".to_string(),
            parent_gateway: gw.clone(),
            parent_object: listener_key.parent_key.clone(),
            parent_info: listener_key,
            tls_material: None,
            valid: true,
        };
        let gateway_listeners = static_collection(vec![(gw_listener.internal_name(), gw_listener.clone())]);
        let by_parent = index_collection(&gateway_listeners, |l: &GatewayListener| vec![l.parent_object.clone()]);

        let grant_src = static_collection(Vec::new());
        let grants = reference_grant_index(&grant_src);

        let services = static_collection(vec![(
            NamespacedName::new("default", "svc"),
            Service::default(),
        )]);
        let backends = static_collection(Vec::new());

        let route = HttpRoute::new(
            "r",
            HttpRouteSpec {
                inner: CommonRouteSpec {
                    parent_refs: Some(vec![ParentReference {
                        name: "gw".to_string(),
                        ..Default::default()
                    }]),
                },
                hostnames: None,
                rules: Some(vec![HttpRouteRule {
                    name: None,
                    matches: None,
                    filters: None,
                    backend_refs: Some(vec![HttpBackendRef {
                        backend_ref: BackendObjectReference {
                            name: "svc".to_string(),
                            port: Some(8080),
                            ..Default::default()
                        },
                        weight: None,
                        filters: None,
                    }]),
                }]),
            },
        );
        let mut route = route;
        route.metadata.namespace = Some("default".to_string());
        let routes = static_collection(vec![(route_ref.clone(), route)]);

        let resources = http_route_resources(
            &routes,
            by_parent.clone(),
            gateway_listeners.clone(),
            grants.clone(),
            services.clone(),
            backends.clone(),
            grant_src.clone(),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(resources.len(), 1);
        let emitted = resources.get(&"default.r.0.0".to_string()).expect("route emitted");
        assert_eq!(emitted.listener_key.as_deref(), Some("default/gw/http"));
        assert_eq!(emitted.backends.len(), 1);
        assert_eq!(emitted.backends[0].backend_key, NamespacedName::new("default", "svc"));
    }
}
