use agentgateway_collection::{index_collection, Collection, Index};
use agentgateway_core::resource::NamespacedName;
use agentgateway_k8s_api::ReferenceGrant;

/// A cross-namespace reference the caller wants to use.
pub struct RefRequest<'a> {
    pub from_group: &'a str,
    pub from_kind: &'a str,
    pub from_namespace: &'a str,
    pub to_namespace: &'a str,
    pub to_kind: &'a str,
    pub to_name: &'a str,
}

/// Indexes `ReferenceGrant`s by `(to-namespace, to-kind)` and exposes the
/// `Allowed(from, to)` predicate the pipeline gates every cross-namespace
/// reference on.
#[derive(Clone)]
pub struct ReferenceGrantIndex {
    by_target: Index<(String, String), NamespacedName>,
    grants: Collection<NamespacedName, ReferenceGrant>,
}

pub fn reference_grant_index(grants: &Collection<NamespacedName, ReferenceGrant>) -> ReferenceGrantIndex {
    let by_target = index_collection(grants, |g: &ReferenceGrant| {
        g.spec
            .to
            .iter()
            .map(|to| {
                (
                    g.metadata.namespace.clone().unwrap_or_default(),
                    to.kind.clone(),
                )
            })
            .collect()
    });
    ReferenceGrantIndex {
        by_target,
        grants: grants.clone(),
    }
}

impl ReferenceGrantIndex {
    pub fn allowed(&self, req: &RefRequest<'_>) -> bool {
        if req.from_namespace == req.to_namespace {
            return true;
        }
        let candidates = self
            .by_target
            .get(&(req.to_namespace.to_string(), req.to_kind.to_string()));
        candidates.into_iter().any(|key| {
            let Some(grant) = self.grants.get(&key) else {
                return false;
            };
            let from_ok = grant.spec.from.iter().any(|f| {
                f.group == req.from_group
                    && f.kind == req.from_kind
                    && f.namespace == req.from_namespace
            });
            let to_ok = grant.spec.to.iter().any(|t| {
                t.kind == req.to_kind
                    && match t.name.as_deref() {
                        Some(n) => n == req.to_name,
                        None => true,
                    }
            });
            from_ok && to_ok
        })
    }
}
