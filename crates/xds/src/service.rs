//! Delta xDS aggregated discovery service: one task per connection reading
//! requests off the stream, a background resource watcher turning
//! collection events into debounced [`ConfigsUpdated`] batches, and a
//! sender pool draining the per-connection [`PushQueue`] into each
//! connection's response channel.

use crate::connection::{Connection, ConnectionState, ShouldRespond};
use crate::debounce::spawn_debouncer;
use crate::mtls::extract_caller_identity;
use crate::node::parse_node_id;
use crate::push::{spawn_sender_pool, PushQueue};
use crate::ratelimit::RateLimiter;
use crate::resources::{ConfigsUpdated, ResourceChannel};
use agentgateway_collection::Event;
use agentgateway_core::resource::{AgwResource, NamespacedName};
use ahash::AHashMap;
use envoy_types::pb::envoy::service::discovery::v3::aggregated_discovery_service_server::AggregatedDiscoveryService;
use envoy_types::pb::envoy::service::discovery::v3::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, Resource as DeltaResource,
};
use envoy_types::pb::google::protobuf::Any;
use parking_lot::RwLock;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

/// A nonfatal per-connection protocol error that should become a
/// `DiscoveryResponse` error rather than tearing down the whole service.
type NackHook = Box<dyn Fn(&NamespacedName, &str, &str) + Send + Sync>;

pub struct XdsServerConfig {
    pub debounce_after: Duration,
    pub debounce_max: Duration,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_per_sec: u32,
    pub rate_limit_grace: Duration,
    pub push_concurrency: usize,
    pub require_mtls: bool,
}

impl Default for XdsServerConfig {
    fn default() -> Self {
        Self {
            debounce_after: crate::DEFAULT_DEBOUNCE_AFTER,
            debounce_max: crate::DEFAULT_DEBOUNCE_MAX,
            rate_limit_capacity: 200,
            rate_limit_refill_per_sec: 50,
            rate_limit_grace: Duration::from_secs(1),
            push_concurrency: 16,
            require_mtls: false,
        }
    }
}

struct ConnectionEntry {
    conn: Arc<Connection>,
    sender: mpsc::Sender<Result<DeltaDiscoveryResponse, Status>>,
}

/// Shared state for the Delta xDS service: the resource channel every
/// connection reads from, the registry of live connections a resource
/// change is pushed to, and the queue and rate limiter gating delivery.
pub struct XdsServer {
    resources: ResourceChannel,
    connections: RwLock<AHashMap<u64, ConnectionEntry>>,
    push_queue: Arc<PushQueue>,
    rate_limiter: RateLimiter,
    version_counter: AtomicU64,
    require_mtls: bool,
    on_nack: Option<NackHook>,
}

impl XdsServer {
    pub fn new(resources: ResourceChannel, config: XdsServerConfig) -> Arc<Self> {
        Self::with_nack_hook(resources, config, None)
    }

    /// Same as [`XdsServer::new`], additionally invoking `on_nack` whenever
    /// a connection rejects a pushed response — the syncer binary wires
    /// this to surface a Kubernetes Warning Event on the Gateway.
    pub fn with_nack_hook(resources: ResourceChannel, config: XdsServerConfig, on_nack: Option<NackHook>) -> Arc<Self> {
        let server = Arc::new(Self {
            resources: resources.clone(),
            connections: RwLock::new(AHashMap::default()),
            push_queue: PushQueue::new(),
            rate_limiter: RateLimiter::new(config.rate_limit_capacity, config.rate_limit_refill_per_sec, config.rate_limit_grace),
            version_counter: AtomicU64::new(0),
            require_mtls: config.require_mtls,
            on_nack,
        });

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        spawn_resource_watcher(resources, raw_tx);
        let flush_rx = spawn_debouncer(raw_rx, config.debounce_after, config.debounce_max);
        spawn_push_dispatcher(server.clone(), flush_rx);

        let pool_server = server.clone();
        spawn_sender_pool(server.push_queue.clone(), config.push_concurrency, move |conn, update| {
            let server = pool_server.clone();
            async move { server.send_push(conn, update).await }
        });

        server
    }

    /// RFC3339 timestamp prefix plus a monotonic counter, per the push
    /// version format: unique and ordered even within the same instant.
    fn next_version(&self) -> String {
        let seq = self.version_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", chrono::Utc::now().to_rfc3339())
    }

    fn register(&self, conn: Arc<Connection>, sender: mpsc::Sender<Result<DeltaDiscoveryResponse, Status>>) {
        self.connections.write().insert(conn.id, ConnectionEntry { conn, sender });
    }

    fn unregister(&self, id: u64) {
        self.connections.write().remove(&id);
    }

    fn sender_for(&self, id: u64) -> Option<mpsc::Sender<Result<DeltaDiscoveryResponse, Status>>> {
        self.connections.read().get(&id).map(|e| e.sender.clone())
    }

    fn live_connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().map(|e| e.conn.clone()).collect()
    }

    async fn handle_request(&self, conn: &Arc<Connection>, req: DeltaDiscoveryRequest) {
        let type_url = req.type_url.clone();
        let error_detail = req.error_detail.as_ref().map(|e| e.message.clone());
        let decision = conn.should_respond(
            &type_url,
            &req.response_nonce,
            error_detail.as_deref(),
            &req.resource_names_subscribe,
            &req.resource_names_unsubscribe,
        );

        match decision {
            ShouldRespond::Nack { error_detail } => {
                warn!(connection_id = conn.id, gateway = %conn.gateway, %type_url, error = %error_detail, "xDS client rejected last response");
                if let Some(hook) = &self.on_nack {
                    hook(&conn.gateway, &type_url, &error_detail);
                }
            }
            ShouldRespond::Ignore => {
                debug!(connection_id = conn.id, %type_url, "xDS request requires no response");
            }
            ShouldRespond::Respond => self.respond_full(conn, &type_url).await,
        }
    }

    /// Sends every resource of `type_url` currently visible to `conn`,
    /// filtered down to its watched set (or everything, for a wildcard
    /// subscription) — used for the initial response and for any
    /// subscription change.
    async fn respond_full(&self, conn: &Arc<Connection>, type_url: &str) {
        let (names, wildcard) = conn.watched_names(type_url);
        let snapshot = self.resources.snapshot_for(type_url, &conn.gateway);
        let version = self.next_version();
        let resources: Vec<DeltaResource> = snapshot
            .iter()
            .filter(|r| wildcard || names.contains(r.resource.name()))
            .map(|r| to_delta_resource(r, &version))
            .collect();

        let nonce = conn.next_nonce(&version);
        conn.record_sent(type_url, &nonce);
        let response = DeltaDiscoveryResponse {
            system_version_info: version,
            type_url: type_url.to_string(),
            resources,
            removed_resources: Vec::new(),
            nonce,
            ..Default::default()
        };
        self.send_to(conn, response).await;
    }

    /// Sends only the resources named in `update` that `conn` is actually
    /// subscribed to, resolving each name through the resource channel —
    /// `None` means the resource was removed.
    async fn send_push(&self, conn: Arc<Connection>, update: ConfigsUpdated) {
        if conn.state() == ConnectionState::Closing {
            return;
        }
        let version = self.next_version();
        for (type_url, names) in update {
            if !conn.is_subscribed(&type_url) {
                continue;
            }
            let (watched_names, wildcard) = conn.watched_names(&type_url);
            let mut resources = Vec::new();
            let mut removed = Vec::new();
            for name in names {
                if !wildcard && !watched_names.contains(&name) {
                    continue;
                }
                match self.resources.resolve(&type_url, &name, &conn.gateway) {
                    Some(resource) => resources.push(to_delta_resource(&resource, &version)),
                    None => removed.push(name),
                }
            }
            if resources.is_empty() && removed.is_empty() {
                continue;
            }

            let nonce = conn.next_nonce(&version);
            conn.record_sent(&type_url, &nonce);
            let response = DeltaDiscoveryResponse {
                system_version_info: version.clone(),
                type_url,
                resources,
                removed_resources: removed,
                nonce,
                ..Default::default()
            };
            if !self.send_to(&conn, response).await {
                break;
            }
        }
    }

    async fn send_to(&self, conn: &Arc<Connection>, response: DeltaDiscoveryResponse) -> bool {
        let Some(sender) = self.sender_for(conn.id) else {
            return false;
        };
        if sender.send(Ok(response)).await.is_err() {
            warn!(connection_id = conn.id, "xDS response receiver dropped, closing connection");
            conn.set_state(ConnectionState::Closing);
            return false;
        }
        true
    }
}

/// `type_url -> name` of the last value seen for each resource key, so a
/// `Removed` event (which carries only the key) can still be tagged with
/// its type URL for the debouncer. Lives entirely inside this task.
fn spawn_resource_watcher(resources: ResourceChannel, raw_tx: mpsc::UnboundedSender<ConfigsUpdated>) {
    let mut events = resources.subscribe();
    tokio::spawn(async move {
        let mut type_of: AHashMap<String, &'static str> = AHashMap::default();
        loop {
            match events.recv().await {
                Ok(event) => {
                    let (key, type_url) = match &event {
                        Event::Added(k, r) | Event::Updated(k, r) => {
                            let type_url = r.resource.type_url();
                            type_of.insert(k.clone(), type_url);
                            (k.clone(), type_url)
                        }
                        Event::Removed(k) => match type_of.remove(k) {
                            Some(type_url) => (k.clone(), type_url),
                            None => continue,
                        },
                    };
                    let mut update = ConfigsUpdated::default();
                    update.entry(type_url.to_string()).or_default().insert(key);
                    if raw_tx.send(update).is_err() {
                        return;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "xDS resource watcher missed events, resync on next change");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });
}

fn spawn_push_dispatcher(server: Arc<XdsServer>, mut flush_rx: mpsc::UnboundedReceiver<ConfigsUpdated>) {
    tokio::spawn(async move {
        while let Some(update) = flush_rx.recv().await {
            let connections = server.live_connections();
            if connections.is_empty() {
                continue;
            }
            server.push_queue.push_all(&connections, update);
        }
    });
}

fn to_delta_resource(resource: &AgwResource, version: &str) -> DeltaResource {
    let value = serde_json::to_vec(resource).expect("AgwResource always serializes");
    DeltaResource {
        name: resource.resource.name().to_string(),
        version: version.to_string(),
        resource: Some(Any { type_url: resource.resource.type_url().to_string(), value }),
        ..Default::default()
    }
}

pub struct AdsService(pub Arc<XdsServer>);

#[tonic::async_trait]
impl AggregatedDiscoveryService for AdsService {
    type StreamAggregatedResourcesStream =
        Pin<Box<dyn tokio_stream::Stream<Item = Result<envoy_types::pb::envoy::service::discovery::v3::DiscoveryResponse, Status>> + Send + 'static>>;
    type DeltaAggregatedResourcesStream = ReceiverStream<Result<DeltaDiscoveryResponse, Status>>;

    async fn stream_aggregated_resources(
        &self,
        _request: Request<Streaming<envoy_types::pb::envoy::service::discovery::v3::DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        Err(Status::unimplemented("this syncer only speaks the Delta xDS variant"))
    }

    async fn delta_aggregated_resources(
        &self,
        request: Request<Streaming<DeltaDiscoveryRequest>>,
    ) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        if !self.0.rate_limiter.acquire().await {
            return Err(Status::resource_exhausted("xDS connection limit reached"));
        }

        let identity = if self.0.require_mtls {
            let peer_certs = request
                .peer_certs()
                .ok_or_else(|| Status::unauthenticated("mTLS is required but no client certificate was presented"))?;
            let identity = extract_caller_identity(peer_certs.as_slice())
                .ok_or_else(|| Status::unauthenticated("client certificate has no recognizable SPIFFE identity"))?;
            Some(identity)
        } else {
            None
        };

        let mut in_stream = request.into_inner();
        let (tx, rx) = mpsc::channel(16);

        let first = match in_stream.next().await {
            Some(Ok(req)) => req,
            Some(Err(e)) => return Err(Status::invalid_argument(format!("failed to read initial request: {e}"))),
            None => return Err(Status::invalid_argument("stream closed before sending an initial request")),
        };

        let node_id = first.node.as_ref().map(|n| n.id.as_str()).unwrap_or_default();
        let gateway = parse_node_id(node_id)
            .ok_or_else(|| Status::invalid_argument(format!("node id {node_id:?} must be of the form namespace/name")))?;

        if let Some(identity) = &identity {
            if !identity.matches(&gateway) {
                return Err(Status::permission_denied("client certificate identity does not match the requested gateway"));
            }
        }

        let server = self.0.clone();
        let conn = Connection::new(gateway.clone());
        server.register(conn.clone(), tx.clone());
        info!(connection_id = conn.id, gateway = %gateway, "xDS connection established");

        tokio::spawn(async move {
            server.handle_request(&conn, first).await;

            while let Some(request) = in_stream.next().await {
                match request {
                    Ok(req) => server.handle_request(&conn, req).await,
                    Err(e) => {
                        warn!(connection_id = conn.id, error = %e, "xDS stream error");
                        break;
                    }
                }
            }

            conn.set_state(ConnectionState::Closing);
            server.unregister(conn.id);
            info!(connection_id = conn.id, "xDS connection closed");
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
