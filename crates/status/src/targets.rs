//! Per-kind glue wiring `run_status_writer` to a concrete CRD. Every kind
//! follows the same shape as `apply_http_route_status`: fetch the live
//! object, merge this controller's contribution into whichever field is
//! multi-controller, build a merge-patch, and let `apply_with_retry` handle
//! backoff and the not-found grace period.

use crate::merge::{merge_policy_ancestors, merge_route_parents};
use crate::writer::{apply_with_retry, get_and_patch_status, ApplyOutcome};
use agentgateway_core::resource::NamespacedName;
use agentgateway_k8s_api::{
    AgwBackend, AgwBackendStatus, Gateway, GatewayStatus, GrpcRoute, GrpcRouteStatus, HttpRoute,
    HttpRouteStatus, TcpRoute, TcpRouteStatus, TlsRoute, TlsRouteStatus, TrafficPolicy,
    TrafficPolicyStatus, XListenerSet, XListenerSetStatus,
};
use kube::Api;
use std::time::Instant;

const STATUS_CONTROLLER_NAME: &str = "agentgateway.dev/status-controller";

fn warn_on_failure(outcome: &ApplyOutcome, kind: &str, target: &NamespacedName) {
    if matches!(outcome, ApplyOutcome::Failed) {
        tracing::error!(kind, namespace = %target.namespace, name = %target.name, "giving up on status write after retries");
    }
}

pub async fn apply_http_route_status(
    client: kube::Client,
    target: NamespacedName,
    ours: HttpRouteStatus,
    first_attempt_at: Instant,
) {
    let api: Api<HttpRoute> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |live| {
                let live_parents = live.status.as_ref().map(|s| s.inner.parents.clone()).unwrap_or_default();
                let merged = merge_route_parents(&live_parents, ours.inner.parents.clone(), STATUS_CONTROLLER_NAME);
                serde_json::json!({
                    "apiVersion": "gateway.networking.k8s.io/v1",
                    "kind": "HTTPRoute",
                    "status": { "parents": merged },
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "HTTPRoute", &target);
}

pub async fn apply_grpc_route_status(
    client: kube::Client,
    target: NamespacedName,
    ours: GrpcRouteStatus,
    first_attempt_at: Instant,
) {
    let api: Api<GrpcRoute> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |live| {
                let live_parents = live.status.as_ref().map(|s| s.inner.parents.clone()).unwrap_or_default();
                let merged = merge_route_parents(&live_parents, ours.inner.parents.clone(), STATUS_CONTROLLER_NAME);
                serde_json::json!({
                    "apiVersion": "gateway.networking.k8s.io/v1",
                    "kind": "GRPCRoute",
                    "status": { "parents": merged },
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "GRPCRoute", &target);
}

pub async fn apply_tcp_route_status(
    client: kube::Client,
    target: NamespacedName,
    ours: TcpRouteStatus,
    first_attempt_at: Instant,
) {
    let api: Api<TcpRoute> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |live| {
                let live_parents = live.status.as_ref().map(|s| s.inner.parents.clone()).unwrap_or_default();
                let merged = merge_route_parents(&live_parents, ours.inner.parents.clone(), STATUS_CONTROLLER_NAME);
                serde_json::json!({
                    "apiVersion": "gateway.networking.k8s.io/v1",
                    "kind": "TCPRoute",
                    "status": { "parents": merged },
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "TCPRoute", &target);
}

pub async fn apply_tls_route_status(
    client: kube::Client,
    target: NamespacedName,
    ours: TlsRouteStatus,
    first_attempt_at: Instant,
) {
    let api: Api<TlsRoute> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |live| {
                let live_parents = live.status.as_ref().map(|s| s.inner.parents.clone()).unwrap_or_default();
                let merged = merge_route_parents(&live_parents, ours.inner.parents.clone(), STATUS_CONTROLLER_NAME);
                serde_json::json!({
                    "apiVersion": "gateway.networking.k8s.io/v1",
                    "kind": "TLSRoute",
                    "status": { "parents": merged },
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "TLSRoute", &target);
}

/// Gateway status has no multi-controller field — each Gateway is owned by
/// exactly one GatewayClass's controller — so the computed status is
/// written as-is rather than merged against the live object.
pub async fn apply_gateway_status(client: kube::Client, target: NamespacedName, ours: GatewayStatus, first_attempt_at: Instant) {
    let api: Api<Gateway> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |_live| {
                serde_json::json!({
                    "apiVersion": "gateway.networking.k8s.io/v1",
                    "kind": "Gateway",
                    "status": ours,
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "Gateway", &target);
}

pub async fn apply_xlistenerset_status(
    client: kube::Client,
    target: NamespacedName,
    ours: XListenerSetStatus,
    first_attempt_at: Instant,
) {
    let api: Api<XListenerSet> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |_live| {
                serde_json::json!({
                    "apiVersion": "gateway.networking.x-k8s.io/v1alpha1",
                    "kind": "XListenerSet",
                    "status": ours,
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "XListenerSet", &target);
}

pub async fn apply_traffic_policy_status(
    client: kube::Client,
    target: NamespacedName,
    ours: TrafficPolicyStatus,
    first_attempt_at: Instant,
) {
    let api: Api<TrafficPolicy> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |live| {
                let live_ancestors = live.status.as_ref().and_then(|s| s.ancestors.clone()).unwrap_or_default();
                let merged = merge_policy_ancestors(&live_ancestors, ours.ancestors.clone().unwrap_or_default(), STATUS_CONTROLLER_NAME);
                serde_json::json!({
                    "apiVersion": "agentgateway.dev/v1alpha1",
                    "kind": "TrafficPolicy",
                    "status": { "ancestors": merged },
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "TrafficPolicy", &target);
}

/// `AgwBackend` status carries only this controller's own `Accepted`
/// condition — no other controller writes it — so it's replaced wholesale.
pub async fn apply_agw_backend_status(
    client: kube::Client,
    target: NamespacedName,
    ours: AgwBackendStatus,
    first_attempt_at: Instant,
) {
    let api: Api<AgwBackend> = Api::namespaced(client, &target.namespace);
    let outcome = apply_with_retry(first_attempt_at, || {
        let api = &api;
        let ours = ours.clone();
        async move {
            get_and_patch_status(api, &target.name, STATUS_CONTROLLER_NAME, move |_live| {
                serde_json::json!({
                    "apiVersion": "agentgateway.dev/v1alpha1",
                    "kind": "Backend",
                    "status": ours,
                })
            })
            .await
        }
    })
    .await;
    warn_on_failure(&outcome, "AgwBackend", &target);
}
