use crate::cluster_info::ClusterInfo;
use agentgateway_collection::{new_collection, Collection};
use agentgateway_k8s_api::GatewayClass;
use std::sync::Arc;

/// Keeps only the classes whose `controllerName` matches this process —
/// step 1 of the translation pipeline.
pub fn accepted_gateway_classes(
    classes: &Collection<String, GatewayClass>,
    cluster: Arc<ClusterInfo>,
) -> Collection<String, GatewayClass> {
    new_collection(classes, Vec::new(), move |_, class| {
        if class.spec.controller_name == cluster.controller_name {
            Some(class.clone())
        } else {
            None
        }
    })
}
