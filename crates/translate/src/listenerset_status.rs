use crate::conditions::condition;
use agentgateway_collection::{new_collection, AnyCollection, Collection};
use agentgateway_core::resource::{GatewayListener, NamespacedName};
use agentgateway_k8s_api::XListenerSetStatus;
use std::sync::Arc;

/// `XListenerSet` status carries only an `Accepted` condition: a listener
/// set is accepted once every listener it contributed resolved (TLS
/// material valid where required). There is no per-listener status on this
/// kind — that detail lives on the owning Gateway's `listeners[]` instead.
pub fn listenerset_status(
    listener_sets: &Collection<NamespacedName, agentgateway_k8s_api::XListenerSet>,
    gateway_listeners: &Collection<String, GatewayListener>,
) -> Collection<NamespacedName, XListenerSetStatus> {
    let gateway_listeners = gateway_listeners.clone();
    let aux: Vec<Arc<dyn AnyCollection>> = vec![Arc::new(gateway_listeners.clone())];

    new_collection(listener_sets, aux, move |key, _ls| {
        let mine: Vec<GatewayListener> = gateway_listeners
            .list()
            .into_iter()
            .filter(|l| l.parent_object.namespace == key.namespace && l.parent_object.name == key.name)
            .collect();

        let accepted = !mine.is_empty() && mine.iter().all(|l| l.valid);
        Some(XListenerSetStatus {
            conditions: Some(vec![condition(
                "Accepted",
                accepted,
                if accepted { "Accepted" } else { "Invalid" },
                if accepted {
                    "listener set accepted"
                } else {
                    "listener set not attached or contains invalid listeners"
                },
            )]),
        })
    })
}
