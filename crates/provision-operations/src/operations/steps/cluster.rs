use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use provision_core::{ClusterRequest, ClusterScaleRequest, OperationKind};
use provision_saga::{CancellationToken, SagaStep};
use tracing::debug;

use super::lock;
use super::waits::{cluster_settled, delete_cluster};
use crate::OperationError;
use crate::operations::{ClusterSagaData, ProvisionSagaContext};
use crate::traits::{ClusterControlPlaneClient, SecretReader};

pub struct CreateClusterStep {
    control_plane: Arc<dyn ClusterControlPlaneClient>,
    secrets: Arc<dyn SecretReader>,
    created: Mutex<Option<String>>,
}

impl CreateClusterStep {
    #[must_use]
    pub fn new(
        control_plane: Arc<dyn ClusterControlPlaneClient>,
        secrets: Arc<dyn SecretReader>,
    ) -> Self {
        Self {
            control_plane,
            secrets,
            created: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SagaStep for CreateClusterStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_cluster"
    }

    async fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output, Self::Error> {
        let spec = input
            .cluster_spec
            .as_ref()
            .ok_or(OperationError::MissingInput {
                step: self.name(),
                what: "a cluster spec",
            })?;

        let key_pair = match &spec.login_secret_id {
            Some(secret_id) => Some(self.secrets.read_secret(secret_id).await.map_err(
                |source| OperationError::Secret {
                    secret_id: secret_id.clone(),
                    source,
                },
            )?),
            None => None,
        };

        let request = ClusterRequest {
            name: spec.name.clone(),
            region: spec.region.clone(),
            kubernetes_version: spec.kubernetes_version.clone(),
            key_pair,
        };
        let handle = self.control_plane.create_cluster(&request).await?;
        *lock(&self.created) = Some(handle.cluster_id.clone());
        debug!(
            cluster_id = %handle.cluster_id,
            name = %request.name,
            region = %request.region,
            "cluster creation requested"
        );

        let descriptor = cluster_settled(
            ctx.poller(),
            self.control_plane.as_ref(),
            &handle.cluster_id,
            OperationKind::Create,
            cancel,
        )
        .await?;

        input.cluster_id = Some(handle.cluster_id);
        input.cluster = Some(descriptor);
        Ok(input)
    }

    async fn compensate(&self, ctx: &Self::Context, _input: Self::Input) -> Result<(), Self::Error> {
        let created = lock(&self.created).take();
        let Some(cluster_id) = created else {
            return Ok(());
        };
        debug!(%cluster_id, "deleting created cluster");
        delete_cluster(
            ctx.poller(),
            self.control_plane.as_ref(),
            &cluster_id,
            &CancellationToken::new(),
        )
        .await
    }

    fn compensation_description(&self) -> String {
        "delete the created cluster".to_string()
    }
}

pub struct DeleteClusterStep {
    control_plane: Arc<dyn ClusterControlPlaneClient>,
}

impl DeleteClusterStep {
    #[must_use]
    pub fn new(control_plane: Arc<dyn ClusterControlPlaneClient>) -> Self {
        Self { control_plane }
    }
}

#[async_trait]
impl SagaStep for DeleteClusterStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_cluster"
    }

    async fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output, Self::Error> {
        let cluster_id = input.require_cluster_id(self.name())?;
        delete_cluster(ctx.poller(), self.control_plane.as_ref(), cluster_id, cancel).await?;

        input.cluster = None;
        Ok(input)
    }

    fn compensation_description(&self) -> String {
        "none (a deleted cluster cannot be restored)".to_string()
    }
}

/// Changes the cluster-level worker count, if one was requested.
pub struct ResizeClusterStep {
    control_plane: Arc<dyn ClusterControlPlaneClient>,
    previous: Mutex<Option<(String, u32)>>,
}

impl ResizeClusterStep {
    #[must_use]
    pub fn new(control_plane: Arc<dyn ClusterControlPlaneClient>) -> Self {
        Self {
            control_plane,
            previous: Mutex::new(None),
        }
    }

    async fn resize(
        &self,
        ctx: &ProvisionSagaContext,
        cluster_id: &str,
        worker_count: u32,
        cancel: &CancellationToken,
    ) -> Result<provision_core::ClusterDescriptor, OperationError> {
        self.control_plane
            .scale_cluster(cluster_id, &ClusterScaleRequest { worker_count })
            .await?;
        cluster_settled(
            ctx.poller(),
            self.control_plane.as_ref(),
            cluster_id,
            OperationKind::Scale,
            cancel,
        )
        .await
    }
}

#[async_trait]
impl SagaStep for ResizeClusterStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "resize_cluster"
    }

    async fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output, Self::Error> {
        let Some(worker_count) = input.worker_count else {
            debug!("no cluster-level resize requested");
            return Ok(input);
        };
        let cluster_id = input.require_cluster_id(self.name())?.to_string();

        let current = self.control_plane.describe_cluster(&cluster_id).await?;
        if current.worker_count == worker_count {
            debug!(%cluster_id, worker_count, "cluster already has the requested size");
            input.cluster = Some(current);
            return Ok(input);
        }

        *lock(&self.previous) = Some((cluster_id.clone(), current.worker_count));
        debug!(
            %cluster_id,
            from = current.worker_count,
            to = worker_count,
            "resizing cluster"
        );
        let descriptor = self.resize(ctx, &cluster_id, worker_count, cancel).await?;

        input.cluster = Some(descriptor);
        Ok(input)
    }

    async fn compensate(&self, ctx: &Self::Context, _input: Self::Input) -> Result<(), Self::Error> {
        let previous = lock(&self.previous).take();
        let Some((cluster_id, worker_count)) = previous else {
            return Ok(());
        };
        debug!(%cluster_id, worker_count, "restoring cluster size");
        self.resize(ctx, &cluster_id, worker_count, &CancellationToken::new())
            .await
            .map(|_| ())
    }

    fn compensation_description(&self) -> String {
        "restore the previous cluster size".to_string()
    }
}
