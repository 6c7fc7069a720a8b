use agentgateway_collection::{index_collection, Collection, Index};
use agentgateway_core::parent::ParentKey;
use agentgateway_core::resource::GatewayListener;

/// Indexes every `GatewayListener` by the `ParentKey` of the object that
/// owns it (a Gateway or an `XListenerSet`), so route parent resolution is
/// an O(1) lookup instead of a scan per route.
pub fn index_by_parent(
    gateway_listeners: &Collection<String, GatewayListener>,
) -> Index<ParentKey, String> {
    index_collection(gateway_listeners, |l: &GatewayListener| vec![l.parent_object.clone()])
}
