use agentgateway_core::resource::NamespacedName;
use ahash::AHashSet;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingNode,
    Initialized,
    Closing,
}

/// Per-type-url subscription state for one connection. Mutated only by the
/// connection's own processing task — never shared across connections —
/// so a `parking_lot::RwLock` guards it purely for interior mutability
/// inside the `Arc<Connection>`, not for cross-task contention.
#[derive(Debug, Default)]
pub struct WatchedResource {
    pub resource_names: AHashSet<String>,
    pub wildcard: bool,
    pub nonce_sent: Option<String>,
    pub nonce_acked: Option<String>,
    pub last_error: Option<String>,
    /// Set while warming a freshly (re)subscribed type so the next
    /// response is sent even though the subscription itself didn't change.
    pub always_respond: bool,
}

impl WatchedResource {
    /// Applies `resource_names_subscribe`/`resource_names_unsubscribe` from
    /// a request, returning whether the subscription actually changed.
    pub fn apply_subscription(&mut self, subscribe: &[String], unsubscribe: &[String]) -> bool {
        let mut changed = false;
        if subscribe.iter().any(|n| n == "*") {
            if !self.wildcard {
                self.wildcard = true;
                changed = true;
            }
        }
        for name in subscribe {
            if name != "*" && self.resource_names.insert(name.clone()) {
                changed = true;
            }
        }
        for name in unsubscribe {
            if self.resource_names.remove(name) {
                changed = true;
            }
            if name == "*" && self.wildcard {
                self.wildcard = false;
                changed = true;
            }
        }
        changed
    }
}

pub enum ShouldRespond {
    /// Subscriptions changed, or the generator is warming — send a response.
    Respond,
    /// A stale ACK/NACK or a no-op request — nothing to send.
    Ignore,
    /// `error_detail` was present: the caller NACKed the last response.
    Nack { error_detail: String },
}

/// One registered xDS client. `gateway` and `state` are set once on the
/// first request; `watched` is keyed by `type_url` and mutated only from
/// this connection's single processing task.
pub struct Connection {
    pub id: u64,
    pub gateway: NamespacedName,
    state: RwLock<ConnectionState>,
    watched: RwLock<ahash::AHashMap<String, WatchedResource>>,
    nonce_counter: AtomicU64,
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl Connection {
    pub fn new(gateway: NamespacedName) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            gateway,
            state: RwLock::new(ConnectionState::Initialized),
            watched: RwLock::new(ahash::AHashMap::default()),
            nonce_counter: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Generates `version + uuid`, per the push-response nonce format.
    pub fn next_nonce(&self, version: &str) -> String {
        let seq = self.nonce_counter.fetch_add(1, Ordering::Relaxed);
        format!("{version}-{seq}-{}", uuid::Uuid::new_v4())
    }

    /// Runs `shouldRespond` for one incoming request against this
    /// connection's current watch state for `type_url`, applying any
    /// subscription change as a side effect (this is the only place
    /// `watched` is mutated, from the connection's own task).
    pub fn should_respond(
        &self,
        type_url: &str,
        response_nonce: &str,
        error_detail: Option<&str>,
        subscribe: &[String],
        unsubscribe: &[String],
    ) -> ShouldRespond {
        let mut watched = self.watched.write();
        let entry = watched.entry(type_url.to_string()).or_default();

        if let Some(message) = error_detail {
            entry.last_error = Some(message.to_string());
            return ShouldRespond::Nack { error_detail: message.to_string() };
        }

        if !response_nonce.is_empty() && Some(response_nonce) != entry.nonce_sent.as_deref() {
            // Stale ACK/NACK referencing a response we no longer recognize.
            return ShouldRespond::Ignore;
        }
        if !response_nonce.is_empty() {
            entry.nonce_acked = Some(response_nonce.to_string());
        }

        let warming = entry.always_respond;
        entry.always_respond = false;
        let subscription_changed = entry.apply_subscription(subscribe, unsubscribe);

        if subscription_changed || warming {
            ShouldRespond::Respond
        } else {
            ShouldRespond::Ignore
        }
    }

    pub fn mark_warming(&self, type_url: &str) {
        self.watched.write().entry(type_url.to_string()).or_default().always_respond = true;
    }

    /// Whether this connection has ever subscribed (even transiently) to
    /// `type_url` — distinct from `watched_names` being empty, which is
    /// also true for a type subscribed and then fully unsubscribed.
    pub fn is_subscribed(&self, type_url: &str) -> bool {
        self.watched.read().contains_key(type_url)
    }

    pub fn watched_names(&self, type_url: &str) -> (AHashSet<String>, bool) {
        let watched = self.watched.read();
        match watched.get(type_url) {
            Some(w) => (w.resource_names.clone(), w.wildcard),
            None => (AHashSet::new(), false),
        }
    }

    pub fn record_sent(&self, type_url: &str, nonce: &str) {
        self.watched
            .write()
            .entry(type_url.to_string())
            .or_default()
            .nonce_sent = Some(nonce.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spontaneous_request_without_subscription_change_is_ignored() {
        let conn = Connection::new(NamespacedName::new("default", "gw"));
        match conn.should_respond("type.a", "", None, &[], &[]) {
            ShouldRespond::Ignore => {}
            _ => panic!("expected Ignore"),
        }
    }

    #[test]
    fn new_subscription_triggers_a_response() {
        let conn = Connection::new(NamespacedName::new("default", "gw"));
        match conn.should_respond("type.a", "", None, &["res-1".to_string()], &[]) {
            ShouldRespond::Respond => {}
            _ => panic!("expected Respond"),
        }
    }

    #[test]
    fn error_detail_is_reported_as_nack_regardless_of_nonce() {
        let conn = Connection::new(NamespacedName::new("default", "gw"));
        conn.record_sent("type.a", "n1");
        match conn.should_respond("type.a", "n1", Some("bad resource"), &[], &[]) {
            ShouldRespond::Nack { error_detail } => assert_eq!(error_detail, "bad resource"),
            _ => panic!("expected Nack"),
        }
    }

    #[test]
    fn stale_nonce_is_ignored() {
        let conn = Connection::new(NamespacedName::new("default", "gw"));
        conn.record_sent("type.a", "n1");
        match conn.should_respond("type.a", "not-n1", None, &[], &[]) {
            ShouldRespond::Ignore => {}
            _ => panic!("expected Ignore"),
        }
    }

    #[test]
    fn ack_with_matching_nonce_and_no_subscription_change_is_ignored() {
        let conn = Connection::new(NamespacedName::new("default", "gw"));
        conn.should_respond("type.a", "", None, &["res-1".to_string()], &[]);
        conn.record_sent("type.a", "n1");
        match conn.should_respond("type.a", "n1", None, &[], &[]) {
            ShouldRespond::Ignore => {}
            _ => panic!("expected Ignore"),
        }
    }

    #[test]
    fn warming_forces_a_response_even_without_a_subscription_change() {
        let conn = Connection::new(NamespacedName::new("default", "gw"));
        conn.mark_warming("type.a");
        match conn.should_respond("type.a", "", None, &[], &[]) {
            ShouldRespond::Respond => {}
            _ => panic!("expected Respond"),
        }
    }
}
