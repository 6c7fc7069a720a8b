use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Vendor-owned backend kind (AI provider, MCP target, or similar). The
/// translation pipeline never inspects `spec`; it hands the whole object to
/// the plugin registered for `(group, kind)`.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "agentgateway.dev",
    version = "v1alpha1",
    kind = "Backend",
    struct = "AgwBackend",
    status = "AgwBackendStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AgwBackendSpec {
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct AgwBackendStatus {
    pub conditions: Option<Vec<k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition>>,
}

/// Vendor-owned policy kind (traffic policy, direct response, JWT auth, rate
/// limit, ...). Opaque `spec` handed to the plugin for `(group, kind)`.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "agentgateway.dev",
    version = "v1alpha1",
    kind = "TrafficPolicy",
    struct = "TrafficPolicy",
    status = "TrafficPolicyStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TrafficPolicySpec {
    pub target_refs: Vec<crate::common::LocalObjectReference>,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct TrafficPolicyStatus {
    pub ancestors: Option<Vec<PolicyAncestorStatus>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAncestorStatus {
    pub ancestor_ref: crate::common::ParentReference,
    pub controller_name: String,
    pub conditions: Vec<k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition>,
}
