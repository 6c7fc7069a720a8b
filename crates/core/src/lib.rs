#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Resource model shared by the translation pipeline, the status writer and
//! the xDS server. Nothing in this crate talks to Kubernetes or the network;
//! it only describes the shapes that flow between those layers.

pub mod error;
pub mod parent;
pub mod plugin;
pub mod resource;
pub mod route;

pub use error::{ErrorKind, TranslationError};
pub use parent::{ListenerProtocol, ParentInfo, ParentKey};
pub use resource::{
    Address, AgwResource, Backend, Bind, GatewayListener, Listener, NamespacedName, Policy,
    PolicyTarget, Route,
};
pub use route::{DeniedReason, RouteAttachment, RouteParentReference};
