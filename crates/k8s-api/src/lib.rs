#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! CRD wrapper types for every Gateway API kind this syncer consumes, plus
//! the vendor-owned kinds that plugins translate. Keeping these in one crate
//! means the translation pipeline never touches `kube`/`k8s-openapi` types
//! directly except through the definitions here.

pub mod backend;
pub mod common;
pub mod gateway;
pub mod grpcroute;
pub mod httproute;
pub mod listenerset;
pub mod referencegrant;
pub mod tcproute;
pub mod tlsroute;

pub use k8s_openapi::{
    api::core::v1::{ConfigMap, Namespace, Node, Secret, Service},
    apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector, Time},
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, Patch, PatchParams, Resource, ResourceExt},
    runtime::watcher::Event as WatchEvent,
    Client, Error,
};

pub use backend::{
    AgwBackend, AgwBackendSpec, AgwBackendStatus, PolicyAncestorStatus, TrafficPolicy,
    TrafficPolicySpec, TrafficPolicyStatus,
};
pub use common::{
    BackendObjectReference, CommonRouteSpec, Hostname, LocalObjectReference, ParentReference,
    RouteParentStatus, RouteStatus, SecretObjectReference,
};
pub use gateway::{
    AllowedRoutes, Gateway, GatewayAddress, GatewayClass, GatewayClassStatus,
    GatewayListener as GatewaySpecListener, GatewaySpec, GatewayStatus, GatewayStatusListener,
    GatewayTlsConfig, RouteGroupKind, RouteNamespaces,
};
pub use grpcroute::{GrpcRoute, GrpcRouteStatus};
pub use httproute::{HttpRoute, HttpRouteStatus};
pub use listenerset::{ListenerSetParentRef, XListenerSet, XListenerSetStatus};
pub use referencegrant::ReferenceGrant;
pub use tcproute::{TcpRoute, TcpRouteStatus};
pub use tlsroute::{TlsRoute, TlsRouteStatus};
