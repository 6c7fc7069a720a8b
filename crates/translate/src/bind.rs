use agentgateway_collection::{new_many_collection, AnyCollection, Collection};
use agentgateway_core::resource::{
    AgwResource, Bind, GatewayListener, Listener, NamespacedName, ResourcePayload,
};
use agentgateway_k8s_api::Gateway;
use ahash::AHashMap;
use std::sync::Arc;

/// Groups a Gateway's listeners by port, picks the winning protocol per the
/// TLS > TCP > HTTPS > HTTP precedence, and emits one `Bind` plus one
/// `Listener` resource per still-valid listener. A port with no valid
/// listener emits nothing — there's no socket to open.
pub fn binds_and_listeners(
    gateways: &Collection<NamespacedName, Gateway>,
    gateway_listeners: &Collection<String, GatewayListener>,
) -> Collection<String, AgwResource> {
    let gateway_listeners = gateway_listeners.clone();
    let aux: Vec<Arc<dyn AnyCollection>> = vec![Arc::new(gateway_listeners.clone())];

    new_many_collection(gateways, aux, move |key: &NamespacedName, _gw: &Gateway| {
        let mine: Vec<GatewayListener> = gateway_listeners
            .list()
            .into_iter()
            .filter(|l| &l.parent_gateway == key && l.valid)
            .collect();
        if mine.is_empty() {
            return Vec::new();
        }

        let mut by_port: AHashMap<u16, Vec<GatewayListener>> = AHashMap::new();
        for listener in mine {
            by_port.entry(listener.parent_info.port).or_default().push(listener);
        }

        let mut out = Vec::new();
        for (port, mut listeners) in by_port {
            listeners.sort_by(|a, b| a.name.cmp(&b.name));
            let winner = listeners
                .iter()
                .max_by_key(|l| l.parent_info.protocol.precedence())
                .expect("non-empty group")
                .parent_info
                .protocol;

            let bind_key = Bind::key_for(port, key);
            out.push((
                format!("bind/{bind_key}"),
                AgwResource {
                    resource: ResourcePayload::Bind(Bind {
                        key: bind_key.clone(),
                        port,
                        protocol: winner,
                    }),
                    gateway: Some(key.clone()),
                },
            ));

            for listener in listeners {
                let listener_key = listener.internal_name();
                out.push((
                    format!("listener/{listener_key}"),
                    AgwResource {
                        resource: ResourcePayload::Listener(Listener {
                            key: listener_key,
                            name: listener.name.clone(),
                            bind_key: bind_key.clone(),
                            hostname: listener.parent_info.hostnames.first().cloned(),
                            protocol: listener.parent_info.protocol,
                            tls: listener.tls_material.clone(),
                        }),
                        gateway: Some(key.clone()),
                    },
                ));
            }
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgateway_collection::static_collection;
    use agentgateway_core::parent::{ListenerProtocol, ParentInfo, ParentKey, ParentKind};
    use agentgateway_k8s_api::GatewaySpec;
    use std::time::Duration;

    fn listener(gw: &NamespacedName, name: &str, port: u16, protocol: ListenerProtocol) -> GatewayListener {
        let parent_key = ParentKey::new(ParentKind::Gateway, gw.namespace.clone(), gw.name.clone());
        GatewayListener {
            name: name.to_string(),
            parent_gateway: gw.clone(),
            parent_object: parent_key.clone(),
            parent_info: ParentInfo {
                parent_key,
                section_name: name.to_string(),
                port,
                protocol,
                hostnames: Vec::new(),
                allowed_route_kinds: Vec::new(),
                namespaces_from: "Same".to_string(),
                tls_passthrough: false,
            },
            tls_material: None,
            valid: true,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn https_wins_over_http_on_shared_port() {
        let key = NamespacedName::new("default", "web");
        let mut gw = Gateway::new("web", GatewaySpec {
            gateway_class_name: "agentgateway".to_string(),
            listeners: Vec::new(),
            addresses: None,
        });
        gw.metadata.namespace = Some("default".to_string());
        let gateways = static_collection(vec![(key.clone(), gw)]);
        let listeners = static_collection(vec![
            (
                "default/web/http".to_string(),
                listener(&key, "http", 8080, ListenerProtocol::Http),
            ),
            (
                "default/web/https".to_string(),
                listener(&key, "https", 8080, ListenerProtocol::Https),
            ),
        ]);

        let resources = binds_and_listeners(&gateways, &listeners);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let bind = resources
            .get(&format!("bind/{}", Bind::key_for(8080, &key)))
            .expect("bind emitted");
        match bind.resource {
            ResourcePayload::Bind(b) => assert_eq!(b.protocol, ListenerProtocol::Https),
            _ => panic!("expected bind"),
        }
        assert_eq!(resources.len(), 3);
    }
}
