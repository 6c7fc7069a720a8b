use agentgateway_k8s_api::{ParentReference, PolicyAncestorStatus, RouteParentStatus};

/// Merges this controller's freshly computed `RouteParentStatus` entries
/// into the live object's list, keeping any entries written by other
/// controllers untouched. Our own entries are sorted by parent name for
/// determinism.
pub fn merge_route_parents(
    live: &[RouteParentStatus],
    ours: Vec<RouteParentStatus>,
    controller_name: &str,
) -> Vec<RouteParentStatus> {
    let mut foreign: Vec<RouteParentStatus> = live
        .iter()
        .filter(|p| p.controller_name != controller_name)
        .cloned()
        .collect();
    let mut ours = ours;
    ours.sort_by(|a, b| parent_sort_key(&a.parent_ref).cmp(&parent_sort_key(&b.parent_ref)));
    foreign.extend(ours);
    foreign
}

pub fn merge_policy_ancestors(
    live: &[PolicyAncestorStatus],
    ours: Vec<PolicyAncestorStatus>,
    controller_name: &str,
) -> Vec<PolicyAncestorStatus> {
    let mut foreign: Vec<PolicyAncestorStatus> = live
        .iter()
        .filter(|a| a.controller_name != controller_name)
        .cloned()
        .collect();
    let mut ours = ours;
    ours.sort_by(|a, b| parent_sort_key(&a.ancestor_ref).cmp(&parent_sort_key(&b.ancestor_ref)));
    foreign.extend(ours);
    foreign
}

fn parent_sort_key(p: &ParentReference) -> (String, String, String, String) {
    (
        p.group.clone().unwrap_or_default(),
        p.kind.clone().unwrap_or_default(),
        p.namespace.clone().unwrap_or_default(),
        p.name.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(controller: &str, name: &str) -> RouteParentStatus {
        RouteParentStatus {
            parent_ref: ParentReference {
                group: None,
                kind: None,
                namespace: None,
                name: name.to_string(),
                section_name: None,
                port: None,
            },
            controller_name: controller.to_string(),
            conditions: Vec::new(),
        }
    }

    #[test]
    fn foreign_controller_entries_survive_merge() {
        let live = vec![parent("other", "gw-a"), parent("ours", "gw-b-stale")];
        let ours = vec![parent("ours", "gw-b")];
        let merged = merge_route_parents(&live, ours, "ours");
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|p| p.controller_name == "other" && p.parent_ref.name == "gw-a"));
        assert!(merged.iter().any(|p| p.controller_name == "ours" && p.parent_ref.name == "gw-b"));
    }
}
