use crate::index::{watch_cluster_scoped, CollectionIndex};
use crate::lease;
use agentgateway_collection::{wait_all_synced, AnyCollection, Collection};
use agentgateway_core::resource::NamespacedName;
use agentgateway_k8s_api::GatewayClass;
use agentgateway_status::{run_status_writer, WriteLease};
use agentgateway_translate::{
    accepted_gateway_classes, all_attachments, all_resources, backend_resources,
    binds_and_listeners, default_backend_registry, gateway_listeners, gateway_status,
    index_by_parent, listenerset_status, reference_grant_index, traffic_policies,
    traffic_policy_status, wrap_plugin_outputs, wrap_policies, wrap_routes, ClusterInfo, Inputs,
    PolicyCtx,
};
use agentgateway_translate::routes::{grpc, http, tcp, tls};
use agentgateway_xds::{AdsService, ResourceChannel, XdsServer, XdsServerConfig};
use anyhow::{bail, Result};
use clap::Parser;
use envoy_types::pb::envoy::service::discovery::v3::aggregated_discovery_service_server::AggregatedDiscoveryServiceServer;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::watcher;
use kube::ResourceExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tonic::transport::Server;
use tracing::{info, info_span, Instrument};

/// Translates Gateway API CRDs into `agentgateway` xDS config and writes the
/// resulting acceptance status back onto those CRDs.
#[derive(Debug, Parser)]
#[clap(name = "agentgateway-syncer", about = "A Gateway API to xDS control-plane syncer")]
pub struct Args {
    #[clap(long, default_value = "agentgateway=info,warn", env = "AGENTGATEWAY_SYNCER_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Address the Delta xDS gRPC service listens on.
    #[clap(long, default_value = "0.0.0.0:15010")]
    xds_addr: SocketAddr,

    /// Name this controller's `GatewayClass.spec.controllerName` must match.
    #[clap(long, default_value = "agentgateway.dev/controller")]
    controller_name: String,

    /// Namespace the syncer Deployment and its write-lease live in.
    #[clap(long, default_value = "agentgateway-system")]
    control_plane_namespace: String,

    /// Name of the Deployment running this syncer, used as the write-lease's
    /// owner reference and to resolve its own UID for NACK events.
    #[clap(long, default_value = "agentgateway-syncer")]
    deployment_name: String,

    /// Quiet window before a burst of resource changes is pushed.
    #[clap(long, default_value = "10")]
    debounce_after_ms: u64,

    /// Upper bound on how long a steady stream of changes can delay a push.
    #[clap(long, default_value = "1000")]
    debounce_max_ms: u64,

    /// Per-connection token bucket capacity for inbound xDS requests.
    #[clap(long, default_value = "200")]
    rate_limit_capacity: u32,

    /// Token bucket refill rate, in requests per second.
    #[clap(long, default_value = "50")]
    rate_limit_refill_per_sec: u32,

    /// Require client certificates to carry a SPIFFE identity matching the
    /// requested Gateway's namespace and service account.
    #[clap(long)]
    require_mtls: bool,

    /// Maximum concurrent status-patch writers per CRD kind.
    #[clap(long, default_value = "5")]
    status_max_workers: usize,
}

impl Args {
    pub async fn parse_and_run() -> Result<()> {
        let Args {
            log_level,
            log_format,
            client,
            admin,
            xds_addr,
            controller_name,
            control_plane_namespace,
            deployment_name,
            debounce_after_ms,
            debounce_max_ms,
            rate_limit_capacity,
            rate_limit_refill_per_sec,
            require_mtls,
            status_max_workers,
        } = Self::parse();

        let cluster_info = Arc::new(ClusterInfo {
            controller_name,
            debounce_after: Duration::from_millis(debounce_after_ms),
            debounce_max: Duration::from_millis(debounce_max_ms),
        });

        let prom = <prometheus_client::registry::Registry>::default();

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| deployment_name.clone());

        let claims = lease::acquire(&runtime, &deployment_name, &control_plane_namespace, hostname.clone()).await?;
        let write_lease: Arc<dyn WriteLease> = Arc::new(lease::LeaseWriteLease::new(claims, hostname));

        let inputs = Inputs::new();
        spawn_watches(&runtime, &inputs);

        let gateway_uids: Collection<NamespacedName, String> = Collection::new();
        {
            let gateways = inputs.gateways.clone();
            let sink = gateway_uids.clone();
            tokio::spawn(async move {
                let mut events = gateways.subscribe();
                let mut synced = gateways.watch_synced();
                while !*synced.borrow() {
                    if synced.changed().await.is_err() {
                        return;
                    }
                }
                for key in gateways.keys() {
                    if let Some(gw) = gateways.get(&key) {
                        if let Some(uid) = gw.uid() {
                            sink.apply(key, uid);
                        }
                    }
                }
                loop {
                    match events.recv().await {
                        Ok(agentgateway_collection::Event::Added(key, gw)) | Ok(agentgateway_collection::Event::Updated(key, gw)) => {
                            if let Some(uid) = gw.uid() {
                                sink.apply(key, uid);
                            }
                        }
                        Ok(agentgateway_collection::Event::Removed(key)) => {
                            sink.remove(&key);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    }
                }
            });
        }

        let deployment_uids: Collection<NamespacedName, String> = Collection::new();
        {
            let sink = deployment_uids.clone();
            let deployments = runtime.watch_all::<Deployment>(watcher::Config::default());
            tokio::spawn(watch_cluster_scoped_deployment_uids(deployments, sink));
        }

        let (nack_tx, nack_rx) = mpsc::channel(1024);
        let events_client = runtime.client();
        let nack_publisher = agentgateway_events::NackPublisher::new(events_client, gateway_uids, deployment_uids);
        let shutdown = runtime.shutdown_handle();
        tokio::spawn(nack_publisher.run(nack_rx, shutdown));

        let all = build_translation_pipeline(&inputs, cluster_info.clone(), write_lease.clone(), runtime.client(), status_max_workers);

        wait_all_synced(&[Arc::new(inputs.gateway_classes.clone()) as Arc<dyn AnyCollection>, Arc::new(inputs.gateways.clone())]).await;

        let resources = ResourceChannel::new(all);
        let xds_config = XdsServerConfig {
            debounce_after: cluster_info.debounce_after,
            debounce_max: cluster_info.debounce_max,
            rate_limit_capacity,
            rate_limit_refill_per_sec,
            rate_limit_grace: Duration::from_secs(1),
            push_concurrency: 16,
            require_mtls,
        };
        let on_nack: Box<dyn Fn(&NamespacedName, &str, &str) + Send + Sync> = Box::new(move |gateway, type_url, error_detail| {
            let event = agentgateway_events::NackEvent {
                gateway: gateway.clone(),
                type_url: type_url.to_string(),
                error_detail: error_detail.to_string(),
            };
            let _ = nack_tx.try_send(event);
        });
        let server = XdsServer::with_nack_hook(resources, xds_config, Some(on_nack));

        tokio::spawn(xds_serve(xds_addr, server, runtime.shutdown_handle()).instrument(info_span!("xds")));

        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

fn spawn_watches<S>(runtime: &kubert::Runtime<S>, inputs: &Inputs) {
    macro_rules! namespaced {
        ($kind:ty, $collection:expr, $name:literal) => {{
            let stream = runtime.watch_all::<$kind>(watcher::Config::default());
            let index = Arc::new(parking_lot::RwLock::new(CollectionIndex::new($collection.clone())));
            tokio::spawn(kubert::index::namespaced(index, stream).instrument(info_span!($name)));
        }};
    }

    namespaced!(agentgateway_k8s_api::Gateway, inputs.gateways, "gateways");
    namespaced!(agentgateway_k8s_api::XListenerSet, inputs.listener_sets, "xlistenersets");
    namespaced!(agentgateway_k8s_api::ReferenceGrant, inputs.reference_grants, "referencegrants");
    namespaced!(agentgateway_k8s_api::HttpRoute, inputs.http_routes, "httproutes");
    namespaced!(agentgateway_k8s_api::GrpcRoute, inputs.grpc_routes, "grpcroutes");
    namespaced!(agentgateway_k8s_api::TcpRoute, inputs.tcp_routes, "tcproutes");
    namespaced!(agentgateway_k8s_api::TlsRoute, inputs.tls_routes, "tlsroutes");
    namespaced!(agentgateway_k8s_api::Service, inputs.services, "services");
    namespaced!(agentgateway_k8s_api::Secret, inputs.secrets, "secrets");
    namespaced!(agentgateway_k8s_api::AgwBackend, inputs.backends, "backends");
    namespaced!(agentgateway_k8s_api::TrafficPolicy, inputs.traffic_policies, "trafficpolicies");

    let gateway_class_stream = runtime.watch_all::<GatewayClass>(watcher::Config::default());
    let gateway_classes = inputs.gateway_classes.clone();
    tokio::spawn(watch_cluster_scoped(gateway_classes, gateway_class_stream, "gatewayclasses").instrument(info_span!("gatewayclasses")));
}

/// Mirrors the Deployment a Gateway's own data-plane workload resolves to by
/// name: `<gateway-name>` in the Gateway's own namespace, the convention the
/// `agentgateway` deployer uses. Kept separate from `Inputs` since nothing
/// in the translation pipeline itself needs a Deployment's UID.
async fn watch_cluster_scoped_deployment_uids(
    stream: impl futures::Stream<Item = watcher::Result<watcher::Event<Deployment>>>,
    sink: Collection<NamespacedName, String>,
) {
    tokio::pin!(stream);
    use tokio_stream::StreamExt;
    loop {
        match stream.next().await {
            Some(Ok(watcher::Event::Apply(deploy))) | Some(Ok(watcher::Event::InitApply(deploy))) => {
                if let (Some(ns), Some(uid)) = (deploy.namespace(), deploy.uid()) {
                    sink.apply(NamespacedName { namespace: ns, name: deploy.name_any() }, uid);
                }
            }
            Some(Ok(watcher::Event::Delete(deploy))) => {
                if let Some(ns) = deploy.namespace() {
                    sink.remove(&NamespacedName { namespace: ns, name: deploy.name_any() });
                }
            }
            Some(Ok(watcher::Event::Init)) => {}
            Some(Ok(watcher::Event::InitDone)) => sink.mark_synced(),
            Some(Err(error)) => tracing::warn!(%error, "deployment watch error, retrying"),
            None => return,
        }
    }
}

fn build_translation_pipeline(
    inputs: &Inputs,
    cluster_info: Arc<ClusterInfo>,
    write_lease: Arc<dyn WriteLease>,
    client: kube::Client,
    status_max_workers: usize,
) -> Collection<String, agentgateway_core::resource::AgwResource> {
    let accepted_classes = accepted_gateway_classes(&inputs.gateway_classes, cluster_info.clone());
    let grants = reference_grant_index(&inputs.reference_grants);
    let listeners = gateway_listeners(&inputs.gateways, &accepted_classes, &inputs.listener_sets, &inputs.secrets, grants.clone());
    let by_parent = index_by_parent(&listeners);

    let http_routes = http::http_route_resources(&inputs.http_routes, by_parent.clone(), listeners.clone(), grants.clone(), inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone());
    let grpc_routes = grpc::grpc_route_resources(&inputs.grpc_routes, by_parent.clone(), listeners.clone(), grants.clone(), inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone());
    let tcp_routes = tcp::tcp_route_resources(&inputs.tcp_routes, by_parent.clone(), listeners.clone(), grants.clone(), inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone());
    let tls_routes = tls::tls_route_resources(&inputs.tls_routes, by_parent.clone(), listeners.clone(), grants.clone(), inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone());

    let http_attachments = http::http_route_attachments(&inputs.http_routes, by_parent.clone(), listeners.clone(), grants.clone());
    let grpc_attachments = grpc::grpc_route_attachments(&inputs.grpc_routes, by_parent.clone(), listeners.clone(), grants.clone());
    let tcp_attachments = tcp::tcp_route_attachments(&inputs.tcp_routes, by_parent.clone(), listeners.clone(), grants.clone());
    let tls_attachments = tls::tls_route_attachments(&inputs.tls_routes, by_parent.clone(), listeners.clone(), grants.clone());
    let attachments = all_attachments(vec![http_attachments, grpc_attachments, tcp_attachments, tls_attachments]);

    let gw_status = gateway_status(&inputs.gateways, &accepted_classes, &listeners, &attachments);
    let ls_status = listenerset_status(&inputs.listener_sets, &listeners);

    let http_status = http::http_route_status(&inputs.http_routes, by_parent.clone(), listeners.clone(), grants.clone(), inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone(), cluster_info.controller_name.clone());
    let grpc_status = grpc::grpc_route_status(&inputs.grpc_routes, by_parent.clone(), listeners.clone(), grants.clone(), inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone(), cluster_info.controller_name.clone());
    let tcp_status = tcp::tcp_route_status(&inputs.tcp_routes, by_parent.clone(), listeners.clone(), grants.clone(), inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone(), cluster_info.controller_name.clone());
    let tls_status = tls::tls_route_status(&inputs.tls_routes, by_parent, listeners.clone(), grants, inputs.services.clone(), inputs.backends.clone(), inputs.reference_grants.clone(), cluster_info.controller_name.clone());

    let registry = Arc::new(default_backend_registry());
    let policy_ctx = Arc::new(PolicyCtx { controller_name: cluster_info.controller_name.clone() });
    let (plugin_outputs, backend_status) = backend_resources(&inputs.backends, registry, policy_ctx);

    let policies = traffic_policies(&inputs.traffic_policies);
    let policy_status = traffic_policy_status(&inputs.traffic_policies, cluster_info.controller_name.clone());

    let binds = binds_and_listeners(&inputs.gateways, &listeners);
    let http_resources = wrap_routes("http", &http_routes, &listeners);
    let grpc_resources = wrap_routes("grpc", &grpc_routes, &listeners);
    let tcp_resources = wrap_routes("tcp", &tcp_routes, &listeners);
    let tls_resources = wrap_routes("tls", &tls_routes, &listeners);
    let plugin_resources = wrap_plugin_outputs(&plugin_outputs);
    let policy_resources = wrap_policies(&policies);

    run_status_writer(http_status, write_lease.clone(), status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_http_route_status(client.clone(), target, ours, first_attempt_at)
    });
    run_status_writer(grpc_status, write_lease.clone(), status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_grpc_route_status(client.clone(), target, ours, first_attempt_at)
    });
    run_status_writer(tcp_status, write_lease.clone(), status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_tcp_route_status(client.clone(), target, ours, first_attempt_at)
    });
    run_status_writer(tls_status, write_lease.clone(), status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_tls_route_status(client.clone(), target, ours, first_attempt_at)
    });
    run_status_writer(gw_status, write_lease.clone(), status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_gateway_status(client.clone(), target, ours, first_attempt_at)
    });
    run_status_writer(ls_status, write_lease.clone(), status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_xlistenerset_status(client.clone(), target, ours, first_attempt_at)
    });
    run_status_writer(policy_status, write_lease.clone(), status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_traffic_policy_status(client.clone(), target, ours, first_attempt_at)
    });
    run_status_writer(backend_status, write_lease, status_max_workers, {
        let client = client.clone();
        move |target, ours, first_attempt_at| agentgateway_status::apply_agw_backend_status(client.clone(), target, ours, first_attempt_at)
    });

    all_resources(vec![binds, http_resources, grpc_resources, tcp_resources, tls_resources, plugin_resources, policy_resources])
}

async fn xds_serve(addr: SocketAddr, server: Arc<XdsServer>, drain: drain::Watch) -> Result<()> {
    let ads = AggregatedDiscoveryServiceServer::new(AdsService(server));
    let (close_tx, close_rx) = tokio::sync::oneshot::channel();
    tokio::pin! {
        let srv = Server::builder().add_service(ads).serve_with_shutdown(addr, async { let _ = close_rx.await; });
    }

    info!(%addr, "xDS gRPC server listening");
    tokio::select! {
        res = (&mut srv) => res.map_err(Into::into),
        handle = drain.signaled() => {
            let _ = close_tx.send(());
            handle.release_after(srv).await.map_err(Into::into)
        }
    }
}
