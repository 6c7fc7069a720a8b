use crate::reference_grant::{RefRequest, ReferenceGrantIndex};
use agentgateway_collection::{new_many_collection, AnyCollection, Collection};
use agentgateway_core::parent::{ListenerProtocol, ParentInfo, ParentKey, ParentKind};
use agentgateway_core::resource::{GatewayListener, NamespacedName, TlsMaterial};
use agentgateway_k8s_api::{Gateway, GatewayClass, GatewaySpecListener, Secret, XListenerSet};
use std::sync::Arc;

fn protocol_of(raw: &str) -> Option<ListenerProtocol> {
    match raw {
        "HTTP" => Some(ListenerProtocol::Http),
        "HTTPS" => Some(ListenerProtocol::Https),
        "TLS" => Some(ListenerProtocol::Tls),
        "TCP" => Some(ListenerProtocol::Tcp),
        _ => None,
    }
}

fn default_allowed_kinds(protocol: ListenerProtocol) -> Vec<String> {
    match protocol {
        ListenerProtocol::Http | ListenerProtocol::Https => {
            vec!["HTTPRoute".to_string(), "GRPCRoute".to_string()]
        }
        ListenerProtocol::Tls => vec!["TLSRoute".to_string()],
        ListenerProtocol::Tcp => vec!["TCPRoute".to_string()],
    }
}

/// Resolves the Secret a listener's `certificateRefs[0]` names, gated by a
/// `ReferenceGrant` when the secret lives in another namespace. Returns
/// `None` (and leaves the listener invalid) when the secret is unreadable
/// or missing.
fn resolve_tls_material(
    listener: &GatewaySpecListener,
    gateway_namespace: &str,
    secrets: &Collection<NamespacedName, Secret>,
    grants: &ReferenceGrantIndex,
) -> Option<TlsMaterial> {
    let tls = listener.tls.as_ref()?;
    if tls.mode.as_deref() == Some("Passthrough") {
        return None;
    }
    let cert_ref = tls.certificate_refs.as_ref()?.first()?;
    let secret_ns = cert_ref.namespace.as_deref().unwrap_or(gateway_namespace);
    if secret_ns != gateway_namespace
        && !grants.allowed(&RefRequest {
            from_group: "gateway.networking.k8s.io",
            from_kind: "Gateway",
            from_namespace: gateway_namespace,
            to_namespace: secret_ns,
            to_kind: "Secret",
            to_name: &cert_ref.name,
        })
    {
        return None;
    }
    let secret = secrets.get(&NamespacedName::new(secret_ns, cert_ref.name.clone()))?;
    let data = secret.data?;
    let cert_chain = data.get("tls.crt")?.0.clone();
    let private_key = data.get("tls.key")?.0.clone();
    Some(TlsMaterial {
        secret: NamespacedName::new(secret_ns, cert_ref.name.clone()),
        cert_chain,
        private_key,
    })
}

fn gateway_listener_entry(
    gw_name: &NamespacedName,
    parent_object: ParentKey,
    listener: &GatewaySpecListener,
    secrets: &Collection<NamespacedName, Secret>,
    grants: &ReferenceGrantIndex,
) -> Option<(String, GatewayListener)> {
    let protocol = protocol_of(&listener.protocol)?;
    let tls_material = resolve_tls_material(listener, &gw_name.namespace, secrets, grants);
    let requires_tls = matches!(protocol, ListenerProtocol::Https | ListenerProtocol::Tls);
    let passthrough = listener
        .tls
        .as_ref()
        .and_then(|t| t.mode.as_deref())
        == Some("Passthrough");
    let valid = !requires_tls || passthrough || tls_material.is_some();

    let allowed_route_kinds = listener
        .allowed_routes
        .as_ref()
        .and_then(|a| a.kinds.as_ref())
        .map(|kinds| kinds.iter().map(|k| k.kind.clone()).collect())
        .unwrap_or_else(|| default_allowed_kinds(protocol));

    let namespaces_from = listener
        .allowed_routes
        .as_ref()
        .and_then(|a| a.namespaces.as_ref())
        .and_then(|n| n.from.clone())
        .unwrap_or_else(|| "Same".to_string());

    let parent_info = ParentInfo {
        parent_key: parent_object.clone(),
        section_name: listener.name.clone(),
        port: listener.port,
        protocol,
        hostnames: listener.hostname.clone().into_iter().collect(),
        allowed_route_kinds,
        namespaces_from,
        tls_passthrough: passthrough,
    };

    let entry = GatewayListener {
        name: listener.name.clone(),
        parent_gateway: gw_name.clone(),
        parent_object,
        parent_info,
        tls_material,
        valid,
    };
    Some((entry.internal_name(), entry))
}

/// Resolves the `XListenerSet`s attached to `gateway` via `parentRef`,
/// honoring cross-namespace attachment only when a `ReferenceGrant` permits
/// it, matching the gating every other cross-namespace reference goes
/// through.
fn attached_listener_sets<'a>(
    gw_name: &NamespacedName,
    listener_sets: &'a [XListenerSet],
    grants: &ReferenceGrantIndex,
) -> Vec<&'a XListenerSet> {
    listener_sets
        .iter()
        .filter(|ls| {
            let pr = &ls.spec.parent_ref;
            if pr.kind.as_deref().unwrap_or("Gateway") != "Gateway" {
                return false;
            }
            if pr.name != gw_name.name {
                return false;
            }
            let ls_namespace = ls.metadata.namespace.as_deref().unwrap_or_default();
            let target_namespace = pr.namespace.as_deref().unwrap_or(ls_namespace);
            if target_namespace != gw_name.namespace {
                return false;
            }
            ls_namespace == gw_name.namespace
                || grants.allowed(&RefRequest {
                    from_group: "gateway.networking.x-k8s.io",
                    from_kind: "XListenerSet",
                    from_namespace: ls_namespace,
                    to_namespace: &gw_name.namespace,
                    to_kind: "Gateway",
                    to_name: &gw_name.name,
                })
        })
        .collect()
}

/// `GatewayListener` derivation: one entry per listener of every accepted
/// Gateway, plus one per listener contributed by an attached `XListenerSet`.
/// Emitted for every listener regardless of validity so that per-listener
/// status can always be computed; only valid listeners become `Listener`
/// resources (see `bind.rs`).
pub fn gateway_listeners(
    gateways: &Collection<NamespacedName, Gateway>,
    accepted_classes: &Collection<String, GatewayClass>,
    listener_sets: &Collection<NamespacedName, XListenerSet>,
    secrets: &Collection<NamespacedName, Secret>,
    grants: ReferenceGrantIndex,
) -> Collection<String, GatewayListener> {
    let accepted_classes = accepted_classes.clone();
    let listener_sets = listener_sets.clone();
    let secrets = secrets.clone();
    let aux: Vec<Arc<dyn AnyCollection>> = vec![
        Arc::new(accepted_classes.clone()),
        Arc::new(listener_sets.clone()),
        Arc::new(secrets.clone()),
    ];

    new_many_collection(gateways, aux, move |key: &NamespacedName, gw: &Gateway| {
        if !accepted_classes.contains(&gw.spec.gateway_class_name) {
            return Vec::new();
        }

        let mut out = Vec::new();
        let gw_parent = ParentKey::new(ParentKind::Gateway, key.namespace.clone(), key.name.clone());
        for listener in &gw.spec.listeners {
            if let Some(entry) =
                gateway_listener_entry(key, gw_parent.clone(), listener, &secrets, &grants)
            {
                out.push(entry);
            }
        }

        let all_sets = listener_sets.list();
        for ls in attached_listener_sets(key, &all_sets, &grants) {
            let ls_namespace = ls.metadata.namespace.clone().unwrap_or_default();
            let ls_name = ls.metadata.name.clone().unwrap_or_default();
            let ls_parent = ParentKey::new(ParentKind::ListenerSet, ls_namespace, ls_name);
            for listener in &ls.spec.listeners {
                if let Some(entry) =
                    gateway_listener_entry(key, ls_parent.clone(), listener, &secrets, &grants)
                {
                    out.push(entry);
                }
            }
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgateway_collection::static_collection;
    use agentgateway_k8s_api::{GatewaySpec, GatewaySpecListener as GwListener};
    use std::time::Duration;

    fn http_listener(name: &str, port: u16) -> GwListener {
        GwListener {
            name: name.to_string(),
            hostname: None,
            port,
            protocol: "HTTP".to_string(),
            tls: None,
            allowed_routes: None,
        }
    }

    fn gateway(class: &str, listeners: Vec<GwListener>) -> Gateway {
        let mut gw = Gateway::new("web", GatewaySpec {
            gateway_class_name: class.to_string(),
            listeners,
            addresses: None,
        });
        gw.metadata.namespace = Some("default".to_string());
        gw
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn only_accepted_class_listeners_are_emitted() {
        let key = NamespacedName::new("default", "web");
        let gateways = static_collection(vec![(key.clone(), gateway("agentgateway", vec![http_listener("http", 80)]))]);
        let classes: Collection<String, GatewayClass> = Collection::new();
        let grant_src: Collection<NamespacedName, agentgateway_k8s_api::ReferenceGrant> = Collection::new();
        let listener_sets: Collection<NamespacedName, XListenerSet> = Collection::new();
        let secrets: Collection<NamespacedName, Secret> = Collection::new();
        listener_sets.mark_synced();
        secrets.mark_synced();
        grant_src.mark_synced();
        let grants = crate::reference_grant::reference_grant_index(&grant_src);

        let listeners = gateway_listeners(&gateways, &classes, &listener_sets, &secrets, grants);
        let mut rx = listeners.watch_synced();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !*rx.borrow() {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert!(listeners.is_empty());

        classes.apply(
            "agentgateway".to_string(),
            GatewayClass::new("agentgateway", agentgateway_k8s_api::gateway::GatewayClassSpec {
                controller_name: "agentgateway.dev/controller".to_string(),
                description: None,
            }),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(listeners.len(), 1);
    }
}
