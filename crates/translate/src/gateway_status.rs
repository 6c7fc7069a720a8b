use crate::conditions::condition;
use agentgateway_collection::{new_collection, AnyCollection, Collection};
use agentgateway_core::resource::{GatewayListener, NamespacedName};
use agentgateway_core::route::RouteAttachment;
use agentgateway_k8s_api::{Gateway, GatewayClass, GatewayStatus, GatewayStatusListener};
use ahash::AHashMap;
use std::sync::Arc;

/// One `GatewayStatus` per Gateway: `Accepted`/`Programmed` conditions plus
/// one `GatewayStatusListener` per listener, attachedRoutes pre-populated to
/// zero so a listener with no routes still appears (step 8's requirement).
pub fn gateway_status(
    gateways: &Collection<NamespacedName, Gateway>,
    accepted_classes: &Collection<String, GatewayClass>,
    gateway_listeners: &Collection<String, GatewayListener>,
    attachments: &Collection<String, RouteAttachment>,
) -> Collection<NamespacedName, GatewayStatus> {
    let accepted_classes = accepted_classes.clone();
    let gateway_listeners = gateway_listeners.clone();
    let attachments = attachments.clone();
    let aux: Vec<Arc<dyn AnyCollection>> = vec![
        Arc::new(accepted_classes.clone()),
        Arc::new(gateway_listeners.clone()),
        Arc::new(attachments.clone()),
    ];

    new_collection(gateways, aux, move |key, gw| {
        let class_accepted = accepted_classes.contains(&gw.spec.gateway_class_name);
        let accepted_condition = condition(
            "Accepted",
            class_accepted,
            if class_accepted { "Accepted" } else { "InvalidGatewayClass" },
            if class_accepted {
                "gateway accepted"
            } else {
                "gatewayClassName does not match an accepted GatewayClass"
            },
        );

        if !class_accepted {
            return Some(GatewayStatus {
                addresses: None,
                conditions: Some(vec![accepted_condition]),
                listeners: None,
            });
        }

        let mine: Vec<GatewayListener> = gateway_listeners
            .list()
            .into_iter()
            .filter(|l| &l.parent_gateway == key)
            .collect();

        let mut attached_counts: AHashMap<String, i32> = AHashMap::new();
        for attachment in attachments.list() {
            if &attachment.gateway == key {
                *attached_counts.entry(attachment.listener_name).or_insert(0) += 1;
            }
        }

        let all_valid = mine.iter().all(|l| l.valid);
        let programmed_condition = condition(
            "Programmed",
            all_valid,
            if all_valid { "Programmed" } else { "Invalid" },
            if all_valid {
                "gateway programmed"
            } else {
                "one or more listeners are invalid"
            },
        );

        let mut listeners: Vec<GatewayStatusListener> = mine
            .iter()
            .map(|l| {
                let name = l.parent_info.section_name.clone();
                let attached_routes = attached_counts.get(&name).copied().unwrap_or(0);
                let resolved_refs = condition(
                    "ResolvedRefs",
                    l.valid,
                    if l.valid { "ResolvedRefs" } else { "InvalidCertificateRef" },
                    if l.valid {
                        "references resolved"
                    } else {
                        "required TLS material could not be resolved"
                    },
                );
                let listener_accepted = condition("Accepted", l.valid, if l.valid { "Accepted" } else { "Invalid" }, "listener accepted");
                GatewayStatusListener {
                    name,
                    attached_routes,
                    conditions: vec![listener_accepted, resolved_refs],
                }
            })
            .collect();
        listeners.sort_by(|a, b| a.name.cmp(&b.name));

        Some(GatewayStatus {
            addresses: None,
            conditions: Some(vec![accepted_condition, programmed_condition]),
            listeners: Some(listeners),
        })
    })
}
