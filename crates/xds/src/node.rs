use agentgateway_core::resource::NamespacedName;

/// The xDS `Node.id` this syncer expects every connecting proxy to send:
/// `namespace/name` of the Gateway it backs. Anything else is rejected
/// before a `Connection` is ever registered.
pub fn parse_node_id(node_id: &str) -> Option<NamespacedName> {
    let (namespace, name) = node_id.split_once('/')?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some(NamespacedName::new(namespace, name))
}

/// Caller identity extracted from peer auth (mTLS client cert), when peer
/// auth is configured. `None` means the listener has no peer auth and any
/// node ID is trusted as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub namespace: String,
    pub service_account: String,
}

impl CallerIdentity {
    /// Checks the caller's identity against the Gateway encoded in the
    /// node ID: `namespace` must match, `service_account` is conventionally
    /// the Gateway's deployer-created service account sharing its name.
    pub fn matches(&self, gateway: &NamespacedName) -> bool {
        self.namespace == gateway.namespace && self.service_account == gateway.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespace_slash_name() {
        let gw = parse_node_id("default/gw-1").unwrap();
        assert_eq!(gw, NamespacedName::new("default", "gw-1"));
    }

    #[test]
    fn rejects_missing_slash() {
        assert!(parse_node_id("gw-1").is_none());
    }

    #[test]
    fn identity_must_match_namespace_and_name() {
        let gw = NamespacedName::new("default", "gw-1");
        let identity = CallerIdentity { namespace: "default".to_string(), service_account: "gw-1".to_string() };
        assert!(identity.matches(&gw));
        let wrong = CallerIdentity { namespace: "default".to_string(), service_account: "gw-2".to_string() };
        assert!(!wrong.matches(&gw));
    }
}
