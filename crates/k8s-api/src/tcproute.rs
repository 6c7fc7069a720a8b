use crate::common::{BackendObjectReference, CommonRouteSpec, RouteStatus};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1alpha2",
    kind = "TCPRoute",
    struct = "TcpRoute",
    status = "TcpRouteStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TcpRouteSpec {
    #[serde(flatten)]
    pub inner: CommonRouteSpec,
    pub rules: Option<Vec<TcpRouteRule>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TcpRouteRule {
    pub backend_refs: Option<Vec<BackendObjectReference>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct TcpRouteStatus {
    #[serde(flatten)]
    pub inner: RouteStatus,
}
