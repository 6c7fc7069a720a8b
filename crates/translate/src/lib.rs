#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Pure functions mapping Gateway API (and vendor-owned) CRDs into the
//! internal resource model defined in `agentgateway_core::resource`. Each
//! pipeline step is a `Collection` built from the one before it with the
//! `agentgateway_collection` operators; nothing here touches the Kubernetes
//! API directly — that's the informer layer's job, represented here only by
//! `Inputs`.

pub mod all_resources;
pub mod backend;
pub mod bind;
pub mod cluster_info;
pub mod conditions;
pub mod gateway_class;
pub mod gateway_status;
pub mod inputs;
pub mod listener;
pub mod listenerset_status;
pub mod policy;
pub mod reference_grant;
pub mod route_attachment;
pub mod route_parents;
pub mod routes;

pub use all_resources::{all_resources, wrap_plugin_outputs, wrap_policies, wrap_routes};
pub use backend::{backend_resources, default_backend_registry, AgwBackendRegistry, PolicyCtx};
pub use bind::binds_and_listeners;
pub use cluster_info::ClusterInfo;
pub use gateway_class::accepted_gateway_classes;
pub use gateway_status::gateway_status;
pub use inputs::Inputs;
pub use listener::gateway_listeners;
pub use listenerset_status::listenerset_status;
pub use policy::{traffic_policies, traffic_policy_status};
pub use reference_grant::{reference_grant_index, RefRequest, ReferenceGrantIndex};
pub use route_attachment::all_attachments;
pub use route_parents::index_by_parent;
