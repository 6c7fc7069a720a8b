//! End-to-end pipeline scenarios: real CRD inputs through the full
//! `translate` chain (gateway classes -> listeners -> routes -> status),
//! asserting the exact resource/status shapes a Gateway API user would see.

use agentgateway_collection::{static_collection, Collection};
use agentgateway_core::parent::ListenerProtocol;
use agentgateway_core::resource::{NamespacedName, ResourcePayload};
use agentgateway_k8s_api::{
    AllowedRoutes, BackendObjectReference, CommonRouteSpec, Gateway, GatewayAddress, GatewayClass,
    GatewayClassSpec, GatewaySpec, GatewaySpecListener, GatewayTlsConfig, HttpBackendRef,
    HttpRoute, HttpRouteRule, HttpRouteSpec, ParentReference, ReferenceGrant, RouteNamespaces,
    Secret, SecretObjectReference, Service, XListenerSet,
};
use agentgateway_translate::{
    accepted_gateway_classes, all_attachments, binds_and_listeners, gateway_listeners,
    gateway_status, index_by_parent, reference_grant_index, routes::http, ClusterInfo,
};
use std::sync::Arc;
use std::time::Duration;

const CONTROLLER: &str = "agentgateway.dev/controller";

fn cluster_info() -> Arc<ClusterInfo> {
    Arc::new(ClusterInfo::new(CONTROLLER))
}

fn http_listener(section: &str, port: u16, namespaces_from: Option<&str>) -> GatewaySpecListener {
    GatewaySpecListener {
        name: section.to_string(),
        hostname: None,
        port,
        protocol: "HTTP".to_string(),
        tls: None,
        allowed_routes: namespaces_from.map(|from| AllowedRoutes {
            namespaces: Some(RouteNamespaces { from: Some(from.to_string()), selector: None }),
            kinds: None,
        }),
    }
}

fn https_listener(section: &str, port: u16, secret_name: &str) -> GatewaySpecListener {
    GatewaySpecListener {
        name: section.to_string(),
        hostname: None,
        port,
        protocol: "HTTPS".to_string(),
        tls: Some(GatewayTlsConfig {
            mode: None,
            certificate_refs: Some(vec![SecretObjectReference {
                group: None,
                kind: None,
                name: secret_name.to_string(),
                namespace: None,
            }]),
        }),
        allowed_routes: None,
    }
}

fn gateway(namespace: &str, name: &str, class: &str, listeners: Vec<GatewaySpecListener>) -> Gateway {
    let mut gw = Gateway::new(
        name,
        GatewaySpec { gateway_class_name: class.to_string(), listeners, addresses: None::<Vec<GatewayAddress>> },
    );
    gw.metadata.namespace = Some(namespace.to_string());
    gw
}

fn http_route(namespace: &str, name: &str, parent_refs: Vec<ParentReference>, backend: BackendObjectReference) -> HttpRoute {
    let mut route = HttpRoute::new(
        name,
        HttpRouteSpec {
            inner: CommonRouteSpec { parent_refs: Some(parent_refs) },
            hostnames: None,
            rules: Some(vec![HttpRouteRule {
                name: None,
                matches: None,
                filters: None,
                backend_refs: Some(vec![HttpBackendRef { backend_ref: backend, weight: None, filters: None }]),
            }]),
        },
    );
    route.metadata.namespace = Some(namespace.to_string());
    route
}

fn accepted_class(name: &str) -> Collection<String, GatewayClass> {
    static_collection(vec![(
        name.to_string(),
        GatewayClass::new(name, GatewayClassSpec { controller_name: CONTROLLER.to_string(), description: None }),
    )])
}

async fn wait_synced<K, T>(collection: &Collection<K, T>)
where
    K: Clone + Eq + std::hash::Hash + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let mut rx = collection.watch_synced();
    tokio::time::timeout(Duration::from_secs(2), async {
        while !*rx.borrow() {
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("collection synced");
}

/// Scenario 1: single HTTP Gateway + HTTPRoute, same namespace.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_1_single_gateway_single_backend() {
    let classes = accepted_class("x");
    let gateways = static_collection(vec![(
        NamespacedName::new("default", "gw"),
        gateway("default", "gw", "x", vec![http_listener("http", 80, Some("All"))]),
    )]);
    let listener_sets: Collection<NamespacedName, XListenerSet> = static_collection(Vec::new());
    let secrets: Collection<NamespacedName, Secret> = static_collection(Vec::new());
    let grant_src: Collection<NamespacedName, ReferenceGrant> = static_collection(Vec::new());
    let grants = reference_grant_index(&grant_src);

    let accepted = accepted_gateway_classes(&classes, cluster_info());
    let listeners = gateway_listeners(&gateways, &accepted, &listener_sets, &secrets, grants.clone());
    let by_parent = index_by_parent(&listeners);

    let services: Collection<NamespacedName, Service> =
        static_collection(vec![(NamespacedName::new("default", "svc"), Service::default())]);
    let backends = static_collection(Vec::new());

    let route = http_route(
        "default",
        "r",
        vec![ParentReference { name: "gw".to_string(), ..Default::default() }],
        BackendObjectReference { name: "svc".to_string(), port: Some(8080), ..Default::default() },
    );
    let routes = static_collection(vec![(NamespacedName::new("default", "r"), route)]);

    let resources = http::http_route_resources(
        &routes, by_parent.clone(), listeners.clone(), grants.clone(), services.clone(), backends.clone(), grant_src.clone(),
    );
    wait_synced(&resources).await;

    let emitted = resources.get(&"default.r.0.0".to_string()).expect("route key omits absent section");
    assert_eq!(emitted.listener_key.as_deref(), Some("default/gw/http"));
    assert_eq!(emitted.backends[0].backend_key, NamespacedName::new("default", "svc"));

    let status = http::http_route_status(
        &routes, by_parent.clone(), listeners.clone(), grants.clone(), services.clone(), backends.clone(), grant_src.clone(), CONTROLLER.to_string(),
    );
    wait_synced(&status).await;
    let route_status = status.get(&NamespacedName::new("default", "r")).unwrap();
    let parent = &route_status.inner.parents[0];
    assert_eq!(parent.conditions.iter().find(|c| c.type_ == "Accepted").unwrap().status, "True");
    assert_eq!(parent.conditions.iter().find(|c| c.type_ == "ResolvedRefs").unwrap().status, "True");

    let attachments = http::http_route_attachments(&routes, by_parent, listeners.clone(), grants);
    wait_synced(&attachments).await;
    let gw_status = gateway_status(&gateways, &accepted, &listeners, &all_attachments(vec![attachments]));
    wait_synced(&gw_status).await;
    let status = gw_status.get(&NamespacedName::new("default", "gw")).unwrap();
    let listener_status = &status.listeners.unwrap()[0];
    assert_eq!(listener_status.attached_routes, 1);

    let binds = binds_and_listeners(&gateways, &listeners);
    wait_synced(&binds).await;
    assert!(binds.list().iter().any(|r| matches!(&r.resource, ResourcePayload::Bind(b) if b.key == "80/default/gw")));
}

/// Scenario 2: HTTPRoute with a missing backend Service.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_2_missing_backend() {
    let classes = accepted_class("x");
    let gateways = static_collection(vec![(
        NamespacedName::new("default", "gw"),
        gateway("default", "gw", "x", vec![http_listener("http", 80, Some("All"))]),
    )]);
    let listener_sets: Collection<NamespacedName, XListenerSet> = static_collection(Vec::new());
    let secrets: Collection<NamespacedName, Secret> = static_collection(Vec::new());
    let grant_src: Collection<NamespacedName, ReferenceGrant> = static_collection(Vec::new());
    let grants = reference_grant_index(&grant_src);

    let accepted = accepted_gateway_classes(&classes, cluster_info());
    let listeners = gateway_listeners(&gateways, &accepted, &listener_sets, &secrets, grants.clone());
    let by_parent = index_by_parent(&listeners);

    let services: Collection<NamespacedName, Service> = static_collection(Vec::new());
    let backends = static_collection(Vec::new());

    let route = http_route(
        "default",
        "r",
        vec![ParentReference { name: "gw".to_string(), ..Default::default() }],
        BackendObjectReference { name: "missing".to_string(), port: Some(8080), ..Default::default() },
    );
    let routes = static_collection(vec![(NamespacedName::new("default", "r"), route)]);

    let resources = http::http_route_resources(
        &routes, by_parent.clone(), listeners.clone(), grants.clone(), services.clone(), backends.clone(), grant_src.clone(),
    );
    wait_synced(&resources).await;
    let emitted = resources.get(&"default.r.0.0".to_string()).expect("route is still emitted and attached");
    assert!(emitted.backends.is_empty());

    let status = http::http_route_status(
        &routes, by_parent, listeners.clone(), grants, services, backends, grant_src, CONTROLLER.to_string(),
    );
    wait_synced(&status).await;
    let route_status = status.get(&NamespacedName::new("default", "r")).unwrap();
    let parent = &route_status.inner.parents[0];
    assert_eq!(parent.conditions.iter().find(|c| c.type_ == "Accepted").unwrap().status, "True");
    let resolved = parent.conditions.iter().find(|c| c.type_ == "ResolvedRefs").unwrap();
    assert_eq!(resolved.status, "False");
    assert_eq!(resolved.reason, "BackendNotFound");
}

/// Scenario 3: cross-namespace HTTPRoute denied by `from=Same`.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_3_cross_namespace_denied_by_listener() {
    let classes = accepted_class("x");
    let gateways = static_collection(vec![(
        NamespacedName::new("default", "gw"),
        gateway("default", "gw", "x", vec![http_listener("http", 80, Some("Same"))]),
    )]);
    let listener_sets: Collection<NamespacedName, XListenerSet> = static_collection(Vec::new());
    let secrets: Collection<NamespacedName, Secret> = static_collection(Vec::new());
    // Grants the cross-namespace parentRef itself, so this test exercises
    // the listener's `allowedRoutes.namespaces.from=Same` gate rather than
    // the separate `ReferenceGrant` gate on the parentRef.
    let mut grant = ReferenceGrant::new(
        "allow-other",
        agentgateway_k8s_api::referencegrant::ReferenceGrantSpec {
            from: vec![agentgateway_k8s_api::referencegrant::ReferenceGrantFrom {
                group: "gateway.networking.k8s.io".to_string(),
                kind: "HTTPRoute".to_string(),
                namespace: "other".to_string(),
            }],
            to: vec![agentgateway_k8s_api::referencegrant::ReferenceGrantTo {
                group: "gateway.networking.k8s.io".to_string(),
                kind: "Gateway".to_string(),
                name: None,
            }],
        },
    );
    grant.metadata.namespace = Some("default".to_string());
    let grant_src: Collection<NamespacedName, ReferenceGrant> =
        static_collection(vec![(NamespacedName::new("default", "allow-other"), grant)]);
    let grants = reference_grant_index(&grant_src);

    let accepted = accepted_gateway_classes(&classes, cluster_info());
    let listeners = gateway_listeners(&gateways, &accepted, &listener_sets, &secrets, grants.clone());
    let by_parent = index_by_parent(&listeners);

    let services: Collection<NamespacedName, Service> =
        static_collection(vec![(NamespacedName::new("other", "svc"), Service::default())]);
    let backends = static_collection(Vec::new());

    let route = http_route(
        "other",
        "r",
        vec![ParentReference {
            name: "gw".to_string(),
            namespace: Some("default".to_string()),
            ..Default::default()
        }],
        BackendObjectReference { name: "svc".to_string(), port: Some(8080), ..Default::default() },
    );
    let routes = static_collection(vec![(NamespacedName::new("other", "r"), route)]);

    let resources = http::http_route_resources(
        &routes, by_parent.clone(), listeners.clone(), grants.clone(), services.clone(), backends.clone(), grant_src.clone(),
    );
    wait_synced(&resources).await;
    assert!(resources.is_empty(), "no Route resource should be emitted");

    let status = http::http_route_status(
        &routes, by_parent, listeners, grants, services, backends, grant_src, CONTROLLER.to_string(),
    );
    wait_synced(&status).await;
    let route_status = status.get(&NamespacedName::new("other", "r")).unwrap();
    let parent = &route_status.inner.parents[0];
    let accepted_condition = parent.conditions.iter().find(|c| c.type_ == "Accepted").unwrap();
    assert_eq!(accepted_condition.status, "False");
    assert_eq!(accepted_condition.reason, "NotAllowedByListeners");
}

/// Scenario 4: HTTPS listener whose `certificateRefs[0]` Secret is absent.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_4_tls_listener_missing_secret() {
    let classes = accepted_class("x");
    let gateways = static_collection(vec![(
        NamespacedName::new("default", "gw"),
        gateway("default", "gw", "x", vec![https_listener("https", 443, "nope")]),
    )]);
    let listener_sets: Collection<NamespacedName, XListenerSet> = static_collection(Vec::new());
    let secrets: Collection<NamespacedName, Secret> = static_collection(Vec::new());
    let grant_src: Collection<NamespacedName, ReferenceGrant> = static_collection(Vec::new());
    let grants = reference_grant_index(&grant_src);

    let accepted = accepted_gateway_classes(&classes, cluster_info());
    let listeners = gateway_listeners(&gateways, &accepted, &listener_sets, &secrets, grants);
    wait_synced(&listeners).await;

    let entry = listeners.get(&"default/gw/https".to_string()).expect("listener still emitted");
    assert!(!entry.valid);

    let binds = binds_and_listeners(&gateways, &listeners);
    wait_synced(&binds).await;
    assert!(binds.is_empty(), "no Bind for a port with no valid listener");

    let attachments: Collection<String, agentgateway_core::route::RouteAttachment> = static_collection(Vec::new());
    let gw_status = gateway_status(&gateways, &accepted, &listeners, &attachments);
    wait_synced(&gw_status).await;
    let status = gw_status.get(&NamespacedName::new("default", "gw")).unwrap();
    let listener_status = &status.listeners.unwrap()[0];
    let resolved = listener_status.conditions.iter().find(|c| c.type_ == "ResolvedRefs").unwrap();
    assert_eq!(resolved.status, "False");
    assert_eq!(resolved.reason, "InvalidCertificateRef");
}

/// Scenario 5: two Gateways with an HTTPS listener each on the same port.
#[tokio::test(flavor = "multi_thread")]
async fn scenario_5_two_gateways_same_port() {
    let classes = accepted_class("x");
    let cert = std::collections::BTreeMap::from([
        ("tls.crt".to_string(), k8s_openapi::ByteString(b"cert".to_vec())),
        ("tls.key".to_string(), k8s_openapi::ByteString(b"key".to_vec())),
    ]);
    let mut secret1 = Secret { data: Some(cert.clone()), ..Default::default() };
    secret1.metadata.namespace = Some("ns".to_string());
    secret1.metadata.name = Some("cert1".to_string());
    let mut secret2 = Secret { data: Some(cert), ..Default::default() };
    secret2.metadata.namespace = Some("ns".to_string());
    secret2.metadata.name = Some("cert2".to_string());
    let secrets = static_collection(vec![
        (NamespacedName::new("ns", "cert1"), secret1),
        (NamespacedName::new("ns", "cert2"), secret2),
    ]);

    let gateways = static_collection(vec![
        (NamespacedName::new("ns", "gw1"), gateway("ns", "gw1", "x", vec![https_listener("https", 443, "cert1")])),
        (NamespacedName::new("ns", "gw2"), gateway("ns", "gw2", "x", vec![https_listener("https", 443, "cert2")])),
    ]);
    let listener_sets: Collection<NamespacedName, XListenerSet> = static_collection(Vec::new());
    let grant_src: Collection<NamespacedName, ReferenceGrant> = static_collection(Vec::new());
    let grants = reference_grant_index(&grant_src);

    let accepted = accepted_gateway_classes(&classes, cluster_info());
    let listeners = gateway_listeners(&gateways, &accepted, &listener_sets, &secrets, grants);
    wait_synced(&listeners).await;

    let binds = binds_and_listeners(&gateways, &listeners);
    wait_synced(&binds).await;
    let bind_keys: Vec<_> = binds
        .list()
        .iter()
        .filter_map(|r| match &r.resource {
            ResourcePayload::Bind(b) => Some(b.key.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(bind_keys.len(), 2);
    assert!(bind_keys.contains(&"443/ns/gw1".to_string()));
    assert!(bind_keys.contains(&"443/ns/gw2".to_string()));

    let listener_keys: Vec<_> = binds
        .list()
        .iter()
        .filter(|r| matches!(&r.resource, ResourcePayload::Listener(_)))
        .count();
    assert_eq!(listener_keys, 2);

    for l in listeners.list() {
        assert_eq!(l.parent_info.protocol, ListenerProtocol::Https);
        assert!(l.valid);
    }
}
