use crate::gateway::GatewayListener;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The alpha `XListenerSet` kind: a separately versioned bundle of listeners
/// that attaches to a Gateway via `parentRef`.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.networking.x-k8s.io",
    version = "v1alpha1",
    kind = "XListenerSet",
    struct = "XListenerSet",
    status = "XListenerSetStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct XListenerSetSpec {
    pub parent_ref: ListenerSetParentRef,
    pub listeners: Vec<GatewayListener>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListenerSetParentRef {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct XListenerSetStatus {
    pub conditions: Option<Vec<Condition>>,
}
