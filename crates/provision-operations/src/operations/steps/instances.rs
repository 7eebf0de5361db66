use std::sync::Arc;

use async_trait::async_trait;
use provision_core::OperationKind;
use provision_saga::{CancellationToken, SagaStep};
use tracing::debug;

use super::waits::cluster_settled;
use crate::operations::{ClusterSagaData, ProvisionSagaContext};
use crate::traits::{ClusterControlPlaneClient, NodePoolRecorder};
use crate::{OperationError, Result};

/// Joins the instances gathered by earlier steps to the cluster.
pub struct JoinInstancesStep {
    control_plane: Arc<dyn ClusterControlPlaneClient>,
}

impl JoinInstancesStep {
    #[must_use]
    pub fn new(control_plane: Arc<dyn ClusterControlPlaneClient>) -> Self {
        Self { control_plane }
    }
}

#[async_trait]
impl SagaStep for JoinInstancesStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "join_instances"
    }

    async fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output> {
        if input.pending_instances.is_empty() {
            debug!("no instances to join");
            return Ok(input);
        }
        let cluster_id = input.require_cluster_id(self.name())?.to_string();

        debug!(
            %cluster_id,
            count = input.pending_instances.len(),
            "joining instances to cluster"
        );
        self.control_plane
            .attach_instances(&cluster_id, &input.pending_instances)
            .await?;
        let descriptor = cluster_settled(
            ctx.poller(),
            self.control_plane.as_ref(),
            &cluster_id,
            OperationKind::Scale,
            cancel,
        )
        .await?;

        input.cluster = Some(descriptor);
        let joined = std::mem::take(&mut input.pending_instances);
        input.joined_instances.extend(joined);
        Ok(input)
    }

    fn compensation_description(&self) -> String {
        "none (instances leave with their scaling groups)".to_string()
    }
}

/// Persists node-pool identifiers on the enclosing cluster model.
pub struct RecordNodePoolsStep {
    recorder: Arc<dyn NodePoolRecorder>,
}

impl RecordNodePoolsStep {
    #[must_use]
    pub fn new(recorder: Arc<dyn NodePoolRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl SagaStep for RecordNodePoolsStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "record_node_pools"
    }

    async fn execute(
        &self,
        _ctx: &Self::Context,
        input: Self::Input,
        _cancel: &CancellationToken,
    ) -> Result<Self::Output> {
        let cluster_id = input.require_cluster_id(self.name())?;

        self.recorder
            .record_node_pools(cluster_id, &input.node_pools)
            .await
            .map_err(|source| OperationError::Record {
                cluster_id: cluster_id.to_string(),
                source,
            })?;
        debug!(
            cluster_id,
            count = input.node_pools.len(),
            "node pools recorded"
        );
        Ok(input)
    }
}
