use agentgateway_collection::{join, Collection};
use agentgateway_core::route::RouteAttachment;

/// Unions the per-route-kind attachment collections into the single feed
/// the Gateway-status finalizer counts `attachedRoutes` from. Keys already
/// embed the route kind, so collisions across kinds can't happen.
pub fn all_attachments(per_kind: Vec<Collection<String, RouteAttachment>>) -> Collection<String, RouteAttachment> {
    join(per_kind, false)
}
