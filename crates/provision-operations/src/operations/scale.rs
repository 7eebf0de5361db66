use std::sync::Arc;

use provision_config::OrchestratorConfig;
use provision_core::{ClusterDescriptor, NodePoolStatus};
use provision_saga::{CancellationToken, SagaBuilder};
use tracing::{debug, info};

use super::context::{Collaborators, ProvisionSagaContext};
use super::saga_data::{ClusterSagaData, NodePoolScale};
use super::steps::{JoinInstancesStep, RecordNodePoolsStep, ResizeClusterStep, ScaleNodePoolsStep};
use crate::Result;

#[derive(Debug, Clone)]
pub struct ScaleInput {
    pub cluster_id: String,
    /// Node pools the cluster currently has.
    pub node_pools: Vec<NodePoolStatus>,
    /// Cluster-level worker count, if it should change.
    pub worker_count: Option<u32>,
    pub pool_scales: Vec<NodePoolScale>,
}

#[derive(Debug, Clone)]
pub struct ScaleOutput {
    /// Last description of the cluster, if any step refreshed it.
    pub cluster: Option<ClusterDescriptor>,
    pub node_pools: Vec<NodePoolStatus>,
    pub joined_instances: Vec<String>,
}

/// Resizes a cluster and its node pools, joining every new instance.
pub struct ScaleOperation {
    collaborators: Collaborators,
    config: OrchestratorConfig,
}

impl ScaleOperation {
    #[must_use]
    pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    /// # Errors
    ///
    /// Returns the error of the first step that failed, or
    /// [`OperationError::Cancelled`](crate::OperationError::Cancelled) if
    /// `cancel` fired first.
    pub async fn execute(&self, input: ScaleInput, cancel: &CancellationToken) -> Result<ScaleOutput> {
        let collaborators = &self.collaborators;
        let ctx = ProvisionSagaContext::new(&self.config, Arc::clone(&collaborators.event_log));
        let saga = SagaBuilder::new()
            .then(ResizeClusterStep::new(Arc::clone(
                &collaborators.control_plane,
            )))
            .then(ScaleNodePoolsStep::new(Arc::clone(
                &collaborators.scaling_groups,
            )))
            .then(JoinInstancesStep::new(Arc::clone(
                &collaborators.control_plane,
            )))
            .then(RecordNodePoolsStep::new(Arc::clone(
                &collaborators.node_pool_recorder,
            )))
            .build()
            .with_compensation(self.config.compensate());

        info!(
            cluster_id = %input.cluster_id,
            worker_count = ?input.worker_count,
            node_pools = input.pool_scales.len(),
            "scaling cluster"
        );
        let data = ClusterSagaData::for_existing(input.cluster_id, input.node_pools)
            .with_scaling(input.worker_count, input.pool_scales);
        let (result, audit_log) = saga.execute_with_audit(&ctx, data, cancel).await;
        debug!(summary = %audit_log.summary(), "scale saga finished");

        let data = result?;
        info!(joined = data.joined_instances.len(), "cluster scaled");
        Ok(ScaleOutput {
            cluster: data.cluster,
            node_pools: data.node_pools,
            joined_instances: data.joined_instances,
        })
    }
}
