use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a Gateway or a ListenerSet as a route/policy parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentKey {
    pub kind: ParentKind,
    pub namespace: String,
    pub name: String,
}

impl ParentKey {
    pub fn new(kind: ParentKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ParentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParentKind {
    Gateway,
    ListenerSet,
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentKind::Gateway => f.write_str("Gateway"),
            ParentKind::ListenerSet => f.write_str("ListenerSet"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListenerProtocol {
    Http,
    Https,
    Tls,
    Tcp,
}

impl ListenerProtocol {
    /// TLS > TCP > HTTP precedence used when several listeners share a port.
    pub fn precedence(&self) -> u8 {
        match self {
            ListenerProtocol::Tls => 3,
            ListenerProtocol::Tcp => 2,
            ListenerProtocol::Https => 1,
            ListenerProtocol::Http => 0,
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            ListenerProtocol::Http => Some(80),
            ListenerProtocol::Https => Some(443),
            ListenerProtocol::Tls | ListenerProtocol::Tcp => None,
        }
    }
}

/// Per-listener metadata derived from a Gateway or ListenerSet listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentInfo {
    pub parent_key: ParentKey,
    pub section_name: String,
    pub port: u16,
    pub protocol: ListenerProtocol,
    pub hostnames: Vec<String>,
    pub allowed_route_kinds: Vec<String>,
    /// `allowedRoutes.namespaces.from`, defaulting to `"Same"` per the
    /// Gateway API spec when the listener doesn't set it.
    pub namespaces_from: String,
    pub tls_passthrough: bool,
}

impl ParentInfo {
    /// `internalName(ns, gw, section)` from the data model — unique per process.
    pub fn internal_name(&self) -> String {
        format!(
            "{}/{}/{}",
            self.parent_key.namespace, self.parent_key.name, self.section_name
        )
    }
}
