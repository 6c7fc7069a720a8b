//! Parent resolution shared by every route kind, plus the kind-specific
//! rule-expansion and backend-resolution functions in the sibling modules.

pub mod grpc;
pub mod http;
pub mod tcp;
pub mod tls;

use crate::conditions::condition;
use crate::reference_grant::{RefRequest, ReferenceGrantIndex};
use agentgateway_collection::{Collection, Index};
use agentgateway_core::parent::{ParentKey, ParentKind};
use agentgateway_core::resource::{GatewayListener, NamespacedName, RouteBackend};
use agentgateway_core::route::{DeniedReason, RouteParentReference};
use agentgateway_k8s_api::{AgwBackend, BackendObjectReference, ParentReference, RouteParentStatus, Service};
use ahash::AHashMap;

/// One candidate listener admitted (or not) for a single `parentRefs[i]`
/// entry, before the kind/hostname/namespace filters are applied.
struct Candidate {
    listener: GatewayListener,
}

fn resolve_parent_key(pr: &ParentReference, route_namespace: &str) -> (ParentKind, String, String) {
    let kind = match pr.kind.as_deref() {
        Some("XListenerSet") => ParentKind::ListenerSet,
        _ => ParentKind::Gateway,
    };
    let namespace = pr.namespace.clone().unwrap_or_else(|| route_namespace.to_string());
    (kind, namespace, pr.name.clone())
}

fn namespace_admitted(route_namespace: &str, gateway_namespace: &str, from: Option<&str>) -> bool {
    match from.unwrap_or("Same") {
        "All" => true,
        // Label-selector admission needs namespace labels, which this
        // pipeline does not index; fall back to same-namespace admission.
        "Same" | "Selector" => route_namespace == gateway_namespace,
        _ => route_namespace == gateway_namespace,
    }
}

fn hostname_intersects(route_hostnames: &[String], listener_hostnames: &[String]) -> bool {
    if route_hostnames.is_empty() || listener_hostnames.is_empty() {
        return true;
    }
    route_hostnames.iter().any(|rh| {
        listener_hostnames
            .iter()
            .any(|lh| hostname_matches(rh, lh))
    })
}

fn denied_rank(reason: DeniedReason) -> u8 {
    match reason {
        DeniedReason::NotAllowedByListeners => 0,
        DeniedReason::NoMatchingParent => 1,
        DeniedReason::NoMatchingListenerHostname => 2,
        DeniedReason::RefNotPermitted => 3,
    }
}

fn hostname_matches(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let wildcard_match = |wildcard: &str, other: &str| {
        wildcard
            .strip_prefix("*.")
            .is_some_and(|suffix| other.ends_with(suffix) && other.len() > suffix.len())
    };
    wildcard_match(a, b) || wildcard_match(b, a)
}

/// Resolves one `parentRefs[i]` entry into the `RouteParentReference`
/// entries it admits (one per admitted listener candidate), or a single
/// denied entry when nothing admits it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_parent_ref(
    route_ref: &NamespacedName,
    route_kind: &str,
    route_hostnames: &[String],
    check_hostnames: bool,
    index: usize,
    pr: &ParentReference,
    by_parent: &Index<ParentKey, String>,
    gateway_listeners: &Collection<String, GatewayListener>,
    grants: &ReferenceGrantIndex,
) -> Vec<RouteParentReference> {
    let (kind, namespace, name) = resolve_parent_key(pr, &route_ref.namespace);
    let parent_key = ParentKey::new(kind, namespace.clone(), name.clone());
    let parent_gateway = NamespacedName::new(namespace.clone(), name.clone());

    if namespace != route_ref.namespace {
        let from_kind = match kind {
            ParentKind::Gateway => "Gateway",
            ParentKind::ListenerSet => "XListenerSet",
        };
        let allowed = grants.allowed(&RefRequest {
            from_group: "gateway.networking.k8s.io",
            from_kind: route_kind,
            from_namespace: &route_ref.namespace,
            to_namespace: &namespace,
            to_kind: from_kind,
            to_name: &name,
        });
        if !allowed {
            return vec![RouteParentReference {
                route_ref: route_ref.clone(),
                original_parent_ref_index: index,
                parent_key,
                parent_section: pr.section_name.clone(),
                parent_gateway,
                internal_name: format!("{namespace}/{name}"),
                denied_reason: Some(DeniedReason::RefNotPermitted),
            }];
        }
    }

    let mut candidates: Vec<Candidate> = by_parent
        .get(&parent_key)
        .into_iter()
        .filter_map(|key| gateway_listeners.get(&key))
        .filter(|l| match &pr.section_name {
            Some(section) => &l.parent_info.section_name == section,
            None => true,
        })
        .filter(|l| match pr.port {
            Some(port) => l.parent_info.port == port,
            None => true,
        })
        .map(|listener| Candidate { listener })
        .collect();
    candidates.sort_by(|a, b| a.listener.name.cmp(&b.listener.name));

    if candidates.is_empty() {
        return vec![RouteParentReference {
            route_ref: route_ref.clone(),
            original_parent_ref_index: index,
            parent_key,
            parent_section: pr.section_name.clone(),
            parent_gateway,
            internal_name: format!("{namespace}/{name}"),
            denied_reason: Some(DeniedReason::NoMatchingParent),
        }];
    }

    let mut admitted = Vec::new();
    let mut worst_reason: Option<DeniedReason> = None;
    let mut note = |reason: DeniedReason| {
        let rank = |r: DeniedReason| match r {
            DeniedReason::NotAllowedByListeners => 0,
            DeniedReason::NoMatchingParent => 1,
            DeniedReason::NoMatchingListenerHostname => 2,
            DeniedReason::RefNotPermitted => 3,
        };
        worst_reason = Some(match worst_reason {
            Some(existing) if rank(existing) <= rank(reason) => existing,
            _ => reason,
        });
    };

    for candidate in &candidates {
        let info = &candidate.listener.parent_info;
        if !info.allowed_route_kinds.iter().any(|k| k == route_kind) {
            note(DeniedReason::NoMatchingParent);
            continue;
        }
        if !namespace_admitted(
            &route_ref.namespace,
            &candidate.listener.parent_gateway.namespace,
            Some(info.namespaces_from.as_str()),
        ) {
            note(DeniedReason::NotAllowedByListeners);
            continue;
        }
        if check_hostnames && !hostname_intersects(route_hostnames, &info.hostnames) {
            note(DeniedReason::NoMatchingListenerHostname);
            continue;
        }
        admitted.push(RouteParentReference {
            route_ref: route_ref.clone(),
            original_parent_ref_index: index,
            parent_key: candidate.listener.parent_object.clone(),
            // Only carry a section name when the parentRef asked for one —
            // the key/status format omits it otherwise (§3 key format).
            parent_section: pr.section_name.clone(),
            parent_gateway: candidate.listener.parent_gateway.clone(),
            internal_name: candidate.listener.internal_name(),
            denied_reason: None,
        });
    }

    if admitted.is_empty() {
        vec![RouteParentReference {
            route_ref: route_ref.clone(),
            original_parent_ref_index: index,
            parent_key,
            parent_section: pr.section_name.clone(),
            parent_gateway,
            internal_name: format!("{namespace}/{name}"),
            denied_reason: Some(worst_reason.unwrap_or(DeniedReason::NoMatchingListenerHostname)),
        }]
    } else {
        admitted
    }
}

/// Aggregates every `parentRefs[i]` resolution for one route into the
/// per-parent-Gateway list used to build both resource attachment and
/// `RouteParentStatus`.
pub(crate) fn resolve_all_parents(
    route_ref: &NamespacedName,
    route_kind: &str,
    route_hostnames: &[String],
    check_hostnames: bool,
    parent_refs: &[ParentReference],
    by_parent: &Index<ParentKey, String>,
    gateway_listeners: &Collection<String, GatewayListener>,
    grants: &ReferenceGrantIndex,
) -> Vec<RouteParentReference> {
    parent_refs
        .iter()
        .enumerate()
        .flat_map(|(i, pr)| {
            resolve_parent_ref(
                route_ref,
                route_kind,
                route_hostnames,
                check_hostnames,
                i,
                pr,
                by_parent,
                gateway_listeners,
                grants,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_hostname_matches_subdomain() {
        assert!(hostname_matches("*.example.com", "api.example.com"));
        assert!(!hostname_matches("*.example.com", "example.com"));
        assert!(hostname_matches("api.example.com", "api.example.com"));
        assert!(!hostname_matches("api.example.com", "other.example.com"));
    }

    #[test]
    fn empty_hostname_lists_are_wildcards() {
        assert!(hostname_intersects(&[], &["example.com".to_string()]));
        assert!(hostname_intersects(&["example.com".to_string()], &[]));
        assert!(!hostname_intersects(&["a.com".to_string()], &["b.com".to_string()]));
    }

    #[test]
    fn namespace_admission_modes() {
        assert!(namespace_admitted("ns-a", "ns-b", Some("All")));
        assert!(!namespace_admitted("ns-a", "ns-b", Some("Same")));
        assert!(namespace_admitted("ns-a", "ns-a", Some("Same")));
        assert!(namespace_admitted("ns-a", "ns-a", None));
    }
}

/// Resolves a single `backendRef` against Services or vendor `Backend`
/// objects (group/kind dispatch), gated by `ReferenceGrant` when the
/// reference crosses namespaces. Returns `None` on any resolution failure;
/// the caller still emits the Route, just without this backend.
#[allow(clippy::too_many_arguments)]
pub(crate) fn resolve_backend_ref(
    route_namespace: &str,
    route_kind: &str,
    backend_ref: &BackendObjectReference,
    weight: Option<i32>,
    services: &Collection<NamespacedName, Service>,
    backends: &Collection<NamespacedName, AgwBackend>,
    grants: &ReferenceGrantIndex,
) -> Option<RouteBackend> {
    let namespace = backend_ref
        .namespace
        .clone()
        .unwrap_or_else(|| route_namespace.to_string());
    let kind = backend_ref.kind.as_deref().unwrap_or("Service");
    let group = backend_ref.group.as_deref().unwrap_or("");

    if namespace != route_namespace
        && !grants.allowed(&RefRequest {
            from_group: "gateway.networking.k8s.io",
            from_kind: route_kind,
            from_namespace: route_namespace,
            to_namespace: &namespace,
            to_kind: kind,
            to_name: &backend_ref.name,
        })
    {
        return None;
    }

    let key = NamespacedName::new(namespace, backend_ref.name.clone());
    let found = match (group, kind) {
        ("", "Service") => services.contains(&key),
        ("agentgateway.dev", "Backend") => backends.contains(&key),
        _ => false,
    };
    if !found {
        return None;
    }
    Some(RouteBackend {
        backend_key: key,
        weight: weight.unwrap_or(1),
        port: backend_ref.port,
    })
}

/// Aggregates resolved parent references into one `RouteParentStatus` per
/// distinct Gateway, following the `Accepted` reason tie-break: a denied
/// reason wins over acceptance, and among several denied candidates for the
/// same Gateway the highest-priority reason is reported.
pub(crate) fn build_parent_status(
    resolutions: &[RouteParentReference],
    controller_name: &str,
    resolved_refs: impl Fn(&NamespacedName) -> bool,
) -> Vec<RouteParentStatus> {
    let mut by_gateway: AHashMap<NamespacedName, Vec<&RouteParentReference>> = AHashMap::new();
    for r in resolutions {
        by_gateway.entry(r.parent_gateway.clone()).or_default().push(r);
    }

    let mut gateways: Vec<&NamespacedName> = by_gateway.keys().collect();
    gateways.sort();

    gateways
        .into_iter()
        .map(|gw| {
            let entries = &by_gateway[gw];
            let worst_denied = entries
                .iter()
                .filter_map(|r| r.denied_reason)
                .min_by_key(|r| denied_rank(*r));
            let any_accepted = entries.iter().any(|r| r.accepted());

            let accepted_condition = match (any_accepted, worst_denied) {
                (true, _) => condition("Accepted", true, "Accepted", "Route is accepted"),
                (false, Some(reason)) => {
                    condition("Accepted", false, reason.reason(), "Route was not accepted by this parent")
                }
                (false, None) => condition("Accepted", false, "NoMatchingParent", "No matching parent"),
            };
            let resolved = any_accepted && resolved_refs(gw);
            let resolved_condition = condition(
                "ResolvedRefs",
                resolved,
                if resolved { "ResolvedRefs" } else { "BackendNotFound" },
                "backend reference resolution",
            );

            let representative = entries[0];
            RouteParentStatus {
                parent_ref: ParentReference {
                    group: Some("gateway.networking.k8s.io".to_string()),
                    kind: Some(match representative.parent_key.kind {
                        ParentKind::Gateway => "Gateway".to_string(),
                        ParentKind::ListenerSet => "XListenerSet".to_string(),
                    }),
                    namespace: Some(gw.namespace.clone()),
                    name: gw.name.clone(),
                    section_name: representative.parent_section.clone(),
                    port: None,
                },
                controller_name: controller_name.to_string(),
                conditions: vec![accepted_condition, resolved_condition],
            }
        })
        .collect()
}
