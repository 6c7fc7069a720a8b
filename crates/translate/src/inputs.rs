use agentgateway_collection::Collection;
use agentgateway_core::resource::NamespacedName;
use agentgateway_k8s_api::{
    AgwBackend, GatewayClass, GrpcRoute, HttpRoute, ReferenceGrant, Secret, Service, TcpRoute,
    TlsRoute, TrafficPolicy, XListenerSet,
};
use agentgateway_k8s_api::Gateway;

/// Every source collection the pipeline reads. Populated by the informer
/// layer (out of scope here): each `kubert::index::namespaced` watch calls
/// `.apply()`/`.remove()` on the matching collection as events arrive.
#[derive(Clone)]
pub struct Inputs {
    pub gateway_classes: Collection<String, GatewayClass>,
    pub gateways: Collection<NamespacedName, Gateway>,
    pub listener_sets: Collection<NamespacedName, XListenerSet>,
    pub reference_grants: Collection<NamespacedName, ReferenceGrant>,
    pub http_routes: Collection<NamespacedName, HttpRoute>,
    pub grpc_routes: Collection<NamespacedName, GrpcRoute>,
    pub tcp_routes: Collection<NamespacedName, TcpRoute>,
    pub tls_routes: Collection<NamespacedName, TlsRoute>,
    pub services: Collection<NamespacedName, Service>,
    pub secrets: Collection<NamespacedName, Secret>,
    pub backends: Collection<NamespacedName, AgwBackend>,
    pub traffic_policies: Collection<NamespacedName, TrafficPolicy>,
}

impl Inputs {
    pub fn new() -> Self {
        Self {
            gateway_classes: Collection::new(),
            gateways: Collection::new(),
            listener_sets: Collection::new(),
            reference_grants: Collection::new(),
            http_routes: Collection::new(),
            grpc_routes: Collection::new(),
            tcp_routes: Collection::new(),
            tls_routes: Collection::new(),
            services: Collection::new(),
            secrets: Collection::new(),
            backends: Collection::new(),
            traffic_policies: Collection::new(),
        }
    }
}

impl Default for Inputs {
    fn default() -> Self {
        Self::new()
    }
}
