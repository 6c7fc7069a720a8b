use crate::parent::ParentKey;
use crate::resource::NamespacedName;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeniedReason {
    NoMatchingParent,
    NotAllowedByListeners,
    NoMatchingListenerHostname,
    RefNotPermitted,
}

impl DeniedReason {
    pub fn reason(&self) -> &'static str {
        match self {
            DeniedReason::NoMatchingParent => "NoMatchingParent",
            DeniedReason::NotAllowedByListeners => "NotAllowedByListeners",
            DeniedReason::NoMatchingListenerHostname => "NoMatchingListenerHostname",
            DeniedReason::RefNotPermitted => "RefNotPermitted",
        }
    }
}

/// A derived relation produced by reference resolution for a single
/// `parentRefs[i]` entry against one candidate listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteParentReference {
    pub route_ref: NamespacedName,
    pub original_parent_ref_index: usize,
    pub parent_key: ParentKey,
    pub parent_section: Option<String>,
    pub parent_gateway: NamespacedName,
    pub internal_name: String,
    pub denied_reason: Option<DeniedReason>,
}

impl RouteParentReference {
    pub fn accepted(&self) -> bool {
        self.denied_reason.is_none()
    }
}

/// One accepted (route, listener) pair, driving the Gateway listener
/// `attachedRoutes` counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteAttachment {
    pub route: NamespacedName,
    pub route_kind: String,
    pub gateway: NamespacedName,
    pub listener_name: String,
}
