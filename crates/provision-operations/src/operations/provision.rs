use std::sync::Arc;

use provision_config::OrchestratorConfig;
use provision_core::{ClusterDescriptor, ClusterSpec, NodePoolStatus};
use provision_saga::{CancellationToken, SagaBuilder};
use tracing::{debug, info};

use super::context::{Collaborators, ProvisionSagaContext};
use super::saga_data::ClusterSagaData;
use super::steps::{CreateClusterStep, CreateNodePoolsStep, JoinInstancesStep, RecordNodePoolsStep};
use crate::{OperationError, Result};

#[derive(Debug, Clone)]
pub struct ProvisionOutput {
    pub cluster: ClusterDescriptor,
    pub node_pools: Vec<NodePoolStatus>,
    pub joined_instances: Vec<String>,
}

/// Creates a cluster, its node pools, and joins the pools' instances.
///
/// On failure every completed step is undone in reverse order, unless
/// compensation is disabled in the configuration.
pub struct ProvisionOperation {
    collaborators: Collaborators,
    config: OrchestratorConfig,
}

impl ProvisionOperation {
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
    /// [`OperationError::Cancelled`] if `cancel` fired first.
    pub async fn execute(
        &self,
        spec: ClusterSpec,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutput> {
        let collaborators = &self.collaborators;
        let ctx = ProvisionSagaContext::new(&self.config, Arc::clone(&collaborators.event_log));
        let saga = SagaBuilder::new()
            .then(CreateClusterStep::new(
                Arc::clone(&collaborators.control_plane),
                Arc::clone(&collaborators.secrets),
            ))
            .then(CreateNodePoolsStep::new(Arc::clone(
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
            cluster = %spec.name,
            region = %spec.region,
            node_pools = spec.node_pools.len(),
            "provisioning cluster"
        );
        let (result, audit_log) = saga
            .execute_with_audit(&ctx, ClusterSagaData::for_provision(spec), cancel)
            .await;
        debug!(summary = %audit_log.summary(), "provision saga finished");

        let data = result?;
        let cluster = data.cluster.ok_or(OperationError::MissingInput {
            step: "create_cluster",
            what: "a cluster description",
        })?;
        info!(cluster_id = %cluster.cluster_id, "cluster provisioned");

        Ok(ProvisionOutput {
            cluster,
            node_pools: data.node_pools,
            joined_instances: data.joined_instances,
        })
    }
}
