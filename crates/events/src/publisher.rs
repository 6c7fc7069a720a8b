use agentgateway_collection::Collection;
use agentgateway_core::resource::NamespacedName;
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::PostParams;
use kube::Api;
use std::time::SystemTime;
use tokio::sync::mpsc;

const EVENT_REASON: &str = "AgentGatewayNackError";
const REPORTING_COMPONENT: &str = "agentgateway.dev/syncer";

/// One xDS rejection to surface as a Kubernetes Event.
#[derive(Clone, Debug)]
pub struct NackEvent {
    pub gateway: NamespacedName,
    pub type_url: String,
    pub error_detail: String,
}

/// Converts xDS NACKs into `Warning` Events on the source Gateway and the
/// Deployment that backs it. Keeps its own UID caches — populated by the
/// syncer's informers the same way the translation pipeline's own
/// collections are — since nothing else in the process needs a
/// Deployment's UID.
pub struct NackPublisher {
    client: kube::Client,
    gateway_uids: Collection<NamespacedName, String>,
    deployment_uids: Collection<NamespacedName, String>,
}

impl NackPublisher {
    pub fn new(
        client: kube::Client,
        gateway_uids: Collection<NamespacedName, String>,
        deployment_uids: Collection<NamespacedName, String>,
    ) -> Self {
        Self { client, gateway_uids, deployment_uids }
    }

    /// True once both UID caches have completed their initial list.
    pub fn has_synced(&self) -> bool {
        *self.gateway_uids.watch_synced().borrow() && *self.deployment_uids.watch_synced().borrow()
    }

    /// Drains `events` until the channel closes or `shutdown` is signaled,
    /// publishing each as it arrives. Run as a background task; `shutdown`
    /// is a `drain::Watch` lease the caller releases on process shutdown.
    pub async fn run(self, mut events: mpsc::Receiver<NackEvent>, shutdown: drain::Watch) {
        tokio::pin! {
            let released = shutdown.signaled();
        }
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.publish(event).await,
                        None => return,
                    }
                }
                handle = &mut released => {
                    drop(handle);
                    return;
                }
            }
        }
    }

    async fn publish(&self, event: NackEvent) {
        let Some(gateway_uid) = self.gateway_uids.get(&event.gateway) else {
            tracing::debug!(gateway = %event.gateway, "dropping NACK event: Gateway not yet in cache");
            return;
        };
        let Some(deployment_uid) = self.deployment_uids.get(&event.gateway) else {
            tracing::debug!(gateway = %event.gateway, "dropping NACK event: Deployment not yet in cache");
            return;
        };

        let message = format!("{} rejected by data plane: {}", event.type_url, event.error_detail);

        self.emit(&event.gateway, "gateway.networking.k8s.io/v1", "Gateway", gateway_uid, &message).await;
        self.emit(&event.gateway, "apps/v1", "Deployment", deployment_uid, &message).await;
    }

    async fn emit(&self, target: &NamespacedName, api_version: &str, kind: &str, uid: String, message: &str) {
        let api: Api<Event> = Api::namespaced(self.client.clone(), &target.namespace);
        let now = Time(SystemTime::now().into());
        let involved_object = ObjectReference {
            api_version: Some(api_version.to_string()),
            kind: Some(kind.to_string()),
            name: Some(target.name.clone()),
            namespace: Some(target.namespace.clone()),
            uid: Some(uid),
            ..Default::default()
        };
        let event = Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}.", target.name)),
                namespace: Some(target.namespace.clone()),
                ..Default::default()
            },
            involved_object,
            reason: Some(EVENT_REASON.to_string()),
            message: Some(message.to_string()),
            type_: Some("Warning".to_string()),
            source: Some(EventSource { component: Some(REPORTING_COMPONENT.to_string()), ..Default::default() }),
            first_timestamp: Some(now.clone()),
            last_timestamp: Some(now),
            count: Some(1),
            ..Default::default()
        };
        if let Err(error) = api.create(&PostParams::default(), &event).await {
            tracing::warn!(%error, gateway = %target, kind, "failed to publish NACK event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_collections_have_not_synced() {
        // `NackPublisher::has_synced` is just these two borrows ANDed
        // together; constructing a real `kube::Client` needs a cluster, so
        // that composition is exercised by the syncer's integration tests.
        let gateway_uids: Collection<NamespacedName, String> = Collection::new();
        let deployment_uids: Collection<NamespacedName, String> = Collection::new();
        assert!(!*gateway_uids.watch_synced().borrow());
        assert!(!*deployment_uids.watch_synced().borrow());
    }
}
