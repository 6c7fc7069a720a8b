use agentgateway_collection::{new_many_collection, new_collection, Collection};
use agentgateway_core::resource::{NamespacedName, Policy, PolicyTarget};
use agentgateway_k8s_api::{LocalObjectReference, PolicyAncestorStatus, TrafficPolicy, TrafficPolicyStatus};

const MAX_ANCESTORS: usize = 16;

fn policy_target(policy_namespace: &str, target_ref: &LocalObjectReference) -> PolicyTarget {
    match (target_ref.group.as_str(), target_ref.kind.as_str()) {
        ("", "Service") | ("agentgateway.dev", "Backend") => {
            PolicyTarget::Backend(NamespacedName::new(policy_namespace, target_ref.name.clone()))
        }
        ("gateway.networking.k8s.io", "HTTPRoute")
        | ("gateway.networking.k8s.io", "GRPCRoute")
        | ("gateway.networking.k8s.io", "TCPRoute")
        | ("gateway.networking.k8s.io", "TLSRoute") => {
            PolicyTarget::Route(format!("{policy_namespace}/{}", target_ref.name))
        }
        ("gateway.networking.k8s.io", "Gateway") | ("gateway.networking.x-k8s.io", "XListenerSet") => {
            PolicyTarget::Listener(format!("{policy_namespace}/{}", target_ref.name))
        }
        _ => PolicyTarget::Global,
    }
}

/// `NewMany`: one `Policy` per `targetRefs[i]` entry on a `TrafficPolicy`.
pub fn traffic_policies(
    policies: &Collection<NamespacedName, TrafficPolicy>,
) -> Collection<String, Policy> {
    new_many_collection(policies, Vec::new(), move |key, source| {
        source
            .spec
            .target_refs
            .iter()
            .map(|target_ref| {
                let target = policy_target(&key.namespace, target_ref);
                let name = key.clone();
                let policy_key = Policy::key_for(&name, &target);
                (
                    policy_key.clone(),
                    Policy {
                        key: policy_key,
                        name,
                        target,
                        payload: source.spec.payload.clone(),
                    },
                )
            })
            .collect()
    })
}

/// Keeps all ancestor entries belonging to other controllers, then fills the
/// remaining capacity (up to 16 total) with this controller's own entries,
/// sorted by `(group, kind, namespace, name)` and dropping the
/// lowest-sorted overflow. This is the stable selection rule chosen over the
/// source's unspecified truncation behavior.
fn cap_ancestors(mut ancestors: Vec<PolicyAncestorStatus>, controller_name: &str) -> Vec<PolicyAncestorStatus> {
    let (foreign, mut ours): (Vec<_>, Vec<_>) =
        ancestors.drain(..).partition(|a| a.controller_name != controller_name);

    ours.sort_by(|a, b| {
        let ka = (
            a.ancestor_ref.group.clone().unwrap_or_default(),
            a.ancestor_ref.kind.clone().unwrap_or_default(),
            a.ancestor_ref.namespace.clone().unwrap_or_default(),
            a.ancestor_ref.name.clone(),
        );
        let kb = (
            b.ancestor_ref.group.clone().unwrap_or_default(),
            b.ancestor_ref.kind.clone().unwrap_or_default(),
            b.ancestor_ref.namespace.clone().unwrap_or_default(),
            b.ancestor_ref.name.clone(),
        );
        ka.cmp(&kb)
    });

    let remaining_capacity = MAX_ANCESTORS.saturating_sub(foreign.len());
    if ours.len() > remaining_capacity {
        let drop = ours.len() - remaining_capacity;
        ours.drain(0..drop);
    }

    let mut out = foreign;
    out.extend(ours);
    out
}

/// Produces `TrafficPolicyStatus` per source object: one ancestor entry per
/// distinct target, capped and merged with any foreign-controller ancestors
/// already present on the live object (the merge itself — reading the live
/// object — happens in the status writer; this just builds this
/// controller's contribution plus the cap).
pub fn traffic_policy_status(
    policies: &Collection<NamespacedName, TrafficPolicy>,
    controller_name: String,
) -> Collection<NamespacedName, TrafficPolicyStatus> {
    new_collection(policies, Vec::new(), move |key, source| {
        let ours: Vec<PolicyAncestorStatus> = source
            .spec
            .target_refs
            .iter()
            .map(|target_ref| PolicyAncestorStatus {
                ancestor_ref: agentgateway_k8s_api::ParentReference {
                    group: Some(target_ref.group.clone()),
                    kind: Some(target_ref.kind.clone()),
                    namespace: Some(key.namespace.clone()),
                    name: target_ref.name.clone(),
                    section_name: None,
                    port: None,
                },
                controller_name: controller_name.clone(),
                conditions: vec![crate::conditions::condition("Accepted", true, "Accepted", "policy attached")],
            })
            .collect();
        Some(TrafficPolicyStatus {
            ancestors: Some(cap_ancestors(ours, &controller_name)),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ancestor(controller: &str, name: &str) -> PolicyAncestorStatus {
        PolicyAncestorStatus {
            ancestor_ref: agentgateway_k8s_api::ParentReference {
                group: Some("gateway.networking.k8s.io".to_string()),
                kind: Some("Gateway".to_string()),
                namespace: Some("default".to_string()),
                name: name.to_string(),
                section_name: None,
                port: None,
            },
            controller_name: controller.to_string(),
            conditions: Vec::new(),
        }
    }

    #[test]
    fn foreign_ancestors_always_survive_the_cap() {
        let mut ancestors: Vec<_> = (0..20).map(|i| ancestor("ours", &format!("gw{i:02}"))).collect();
        ancestors.push(ancestor("other-controller", "gw-foreign"));

        let capped = cap_ancestors(ancestors, "ours");
        assert_eq!(capped.len(), MAX_ANCESTORS);
        assert!(capped.iter().any(|a| a.controller_name == "other-controller"));
        assert_eq!(capped.iter().filter(|a| a.controller_name == "ours").count(), MAX_ANCESTORS - 1);
    }
}
