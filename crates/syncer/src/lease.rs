//! Leader election backed by a `coordination.k8s.io/v1` `Lease`, the same
//! primitive the admin/runtime scaffolding already uses elsewhere for
//! liveness. Only the write side (status patches, xDS NACK events) is
//! gated on leadership — every replica still serves reads and pushes config
//! over xDS.

use agentgateway_status::WriteLease;
use std::sync::Arc;
use tokio::sync::watch;

pub struct LeaseWriteLease {
    claims: watch::Receiver<Arc<kubert::lease::Claim>>,
    claimant: String,
}

impl LeaseWriteLease {
    pub fn new(claims: watch::Receiver<Arc<kubert::lease::Claim>>, claimant: String) -> Self {
        Self { claims, claimant }
    }
}

impl WriteLease for LeaseWriteLease {
    fn is_leader(&self) -> bool {
        self.claims.borrow().holder == self.claimant
    }
}

pub async fn acquire<T>(
    runtime: &kubert::Runtime<T>,
    deployment_name: &str,
    control_plane_namespace: &str,
    claimant: String,
) -> anyhow::Result<watch::Receiver<Arc<kubert::lease::Claim>>> {
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::coordination::v1 as coordv1;
    use kube::api::{ObjectMeta, Patch, PatchParams};
    use kube::{Api, Resource};

    const LEASE_NAME: &str = "agentgateway-syncer-write";
    const LEASE_DURATION: std::time::Duration = std::time::Duration::from_secs(30);
    const RENEW_GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

    let client = runtime.client();
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), control_plane_namespace);
    let deployment = deployments.get(deployment_name).await?;

    let lease = coordv1::Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            namespace: Some(control_plane_namespace.to_string()),
            resource_version: Some("0".to_string()),
            owner_references: Some(vec![deployment.controller_owner_ref(&()).expect("Deployment has no namespace")]),
            ..Default::default()
        },
        spec: None,
    };

    let leases: Api<coordv1::Lease> = Api::namespaced(client, control_plane_namespace);
    match leases
        .patch(
            LEASE_NAME,
            &PatchParams { field_manager: Some("agentgateway-syncer".into()), ..Default::default() },
            &Patch::Apply(lease),
        )
        .await
    {
        Ok(_) => tracing::info!("created Lease resource"),
        Err(kube::Error::Api(_)) => tracing::debug!("Lease already exists, no need to create it"),
        Err(error) => return Err(error.into()),
    }

    let params = kubert::LeaseParams {
        name: LEASE_NAME.to_string(),
        namespace: control_plane_namespace.to_string(),
        claimant,
        lease_duration: LEASE_DURATION,
        renew_grace_period: RENEW_GRACE_PERIOD,
        field_manager: Some("agentgateway-syncer".into()),
    };
    let (claims, _task) = runtime.spawn_lease(params).await?;
    Ok(claims)
}
