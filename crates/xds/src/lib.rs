pub mod connection;
pub mod debounce;
pub mod mtls;
pub mod node;
pub mod push;
pub mod ratelimit;
pub mod resources;
pub mod service;

pub use connection::{Connection, ConnectionState, ShouldRespond, WatchedResource};
pub use mtls::extract_caller_identity;
pub use node::{parse_node_id, CallerIdentity};
pub use push::PushQueue;
pub use ratelimit::RateLimiter;
pub use resources::{union_configs_updated, ConfigsUpdated, ResourceChannel};
pub use service::{AdsService, XdsServer, XdsServerConfig};

/// Quiet window before a burst of resource changes is flushed to connections.
pub const DEFAULT_DEBOUNCE_AFTER: std::time::Duration = std::time::Duration::from_millis(10);
/// Upper bound on how long a steady stream of changes can delay a flush.
pub const DEFAULT_DEBOUNCE_MAX: std::time::Duration = std::time::Duration::from_secs(1);
