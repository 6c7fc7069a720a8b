use crate::parent::{ListenerProtocol, ParentInfo, ParentKey};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// TLS material resolved from a referenced Secret, or `None` when the
/// listener does not terminate TLS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsMaterial {
    pub secret: NamespacedName,
    pub cert_chain: Vec<u8>,
    pub private_key: Vec<u8>,
}

/// One listener of an accepted Gateway, or of a ListenerSet merged into one.
/// Emitted for every listener regardless of validity so that status can be
/// computed for all of them; only valid ones become `Listener` resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayListener {
    pub name: String,
    pub parent_gateway: NamespacedName,
    pub parent_object: ParentKey,
    pub parent_info: ParentInfo,
    pub tls_material: Option<TlsMaterial>,
    pub valid: bool,
}

impl GatewayListener {
    pub fn internal_name(&self) -> String {
        self.parent_info.internal_name()
    }
}

/// The address/port tuple a Gateway actually opens. Several listeners on the
/// same Gateway and port collapse into a single Bind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    pub key: String,
    pub port: u16,
    pub protocol: ListenerProtocol,
}

impl Bind {
    pub fn key_for(port: u16, gateway: &NamespacedName) -> String {
        format!("{port}/{}/{}", gateway.namespace, gateway.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub key: String,
    pub name: String,
    pub bind_key: String,
    pub hostname: Option<String>,
    pub protocol: ListenerProtocol,
    pub tls: Option<TlsMaterial>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBackend {
    pub backend_key: NamespacedName,
    pub weight: i32,
    pub port: Option<u16>,
}

/// Emitted per (rule x match) for HTTPRoute, per rule for GRPC/TCP/TLS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub key: String,
    pub listener_key: Option<String>,
    pub rule_name: String,
    pub matches: serde_json::Value,
    pub filters: serde_json::Value,
    pub backends: Vec<RouteBackend>,
    pub hostnames: Vec<String>,
}

impl Route {
    /// `namespace.name.rule.match[.section]`
    pub fn key_for(
        namespace: &str,
        name: &str,
        rule_index: usize,
        match_index: usize,
        section: Option<&str>,
    ) -> String {
        match section {
            Some(section) => format!("{namespace}.{name}.{rule_index}.{match_index}.{section}"),
            None => format!("{namespace}.{name}.{rule_index}.{match_index}"),
        }
    }
}

/// Opaque, plugin-produced destination. The core never interprets `payload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub key: NamespacedName,
    pub payload: serde_json::Value,
}

/// Where a Policy attaches. `None` means cluster-global.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyTarget {
    Global,
    Listener(String),
    Route(String),
    Backend(NamespacedName),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub key: String,
    pub name: NamespacedName,
    pub target: PolicyTarget,
    pub payload: serde_json::Value,
}

impl Policy {
    /// Key embeds the target so one source policy targeting several objects
    /// doesn't collide.
    pub fn key_for(name: &NamespacedName, target: &PolicyTarget) -> String {
        let target_tag = match target {
            PolicyTarget::Global => "global".to_string(),
            PolicyTarget::Listener(l) => format!("listener:{l}"),
            PolicyTarget::Route(r) => format!("route:{r}"),
            PolicyTarget::Backend(b) => format!("backend:{b}"),
        };
        format!("{name}.{target_tag}")
    }
}

/// A disjoint union of addressable ambient entities, fed into the address
/// channel only (never into the resource channel).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Address {
    Workload(Workload),
    Service(ServiceAddress),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub name: NamespacedName,
    pub ip: std::net::IpAddr,
    pub node: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub name: NamespacedName,
    pub cluster_ips: Vec<std::net::IpAddr>,
    pub ports: Vec<u16>,
}

/// A unit of emitted configuration, optionally scoped to one Gateway.
/// `gateway == None` means "visible to all gateways".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgwResource {
    pub resource: ResourcePayload,
    pub gateway: Option<NamespacedName>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResourcePayload {
    Bind(Bind),
    Listener(Listener),
    Route(Route),
    Backend(Backend),
    Policy(Policy),
}

impl ResourcePayload {
    pub fn name(&self) -> &str {
        match self {
            ResourcePayload::Bind(b) => &b.key,
            ResourcePayload::Listener(l) => &l.key,
            ResourcePayload::Route(r) => &r.key,
            ResourcePayload::Backend(b) => &b.key.name,
            ResourcePayload::Policy(p) => &p.key,
        }
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            ResourcePayload::Bind(_) => "agentgateway.dev.resource.v1.Bind",
            ResourcePayload::Listener(_) => "agentgateway.dev.resource.v1.Listener",
            ResourcePayload::Route(_) => "agentgateway.dev.resource.v1.Route",
            ResourcePayload::Backend(_) => "agentgateway.dev.resource.v1.Backend",
            ResourcePayload::Policy(_) => "agentgateway.dev.resource.v1.Policy",
        }
    }
}
