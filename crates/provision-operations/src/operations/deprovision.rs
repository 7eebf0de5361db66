use std::sync::Arc;

use provision_config::OrchestratorConfig;
use provision_core::NodePoolStatus;
use provision_saga::{CancellationToken, SagaBuilder};
use tracing::{debug, info};

use super::context::{Collaborators, ProvisionSagaContext};
use super::saga_data::ClusterSagaData;
use super::steps::{DeleteClusterStep, DeleteNodePoolsStep};
use crate::Result;

#[derive(Debug, Clone)]
pub struct DeprovisionInput {
    pub cluster_id: String,
    pub node_pools: Vec<NodePoolStatus>,
}

/// Deletes a cluster's node pools, then the cluster itself.
///
/// Resources that no longer exist count as deleted, so running the
/// operation again after a partial failure is safe.
pub struct DeprovisionOperation {
    collaborators: Collaborators,
    config: OrchestratorConfig,
}

impl DeprovisionOperation {
    #[must_use]
    pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    /// # Errors
    ///
    /// Returns an error if a node pool or the cluster cannot be deleted, or
    /// if `cancel` fired first.
    pub async fn execute(&self, input: DeprovisionInput, cancel: &CancellationToken) -> Result<()> {
        let collaborators = &self.collaborators;
        let ctx = ProvisionSagaContext::new(&self.config, Arc::clone(&collaborators.event_log));
        let saga = SagaBuilder::new()
            .then(DeleteNodePoolsStep::new(Arc::clone(
                &collaborators.scaling_groups,
            )))
            .then(DeleteClusterStep::new(Arc::clone(
                &collaborators.control_plane,
            )))
            .build()
            .with_compensation(self.config.compensate());

        info!(
            cluster_id = %input.cluster_id,
            node_pools = input.node_pools.len(),
            "deprovisioning cluster"
        );
        let cluster_id = input.cluster_id.clone();
        let data = ClusterSagaData::for_existing(input.cluster_id, input.node_pools);
        let (result, audit_log) = saga.execute_with_audit(&ctx, data, cancel).await;
        debug!(summary = %audit_log.summary(), "deprovision saga finished");

        result?;
        info!(%cluster_id, "cluster deprovisioned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use provision_core::{MinMax, OperationKind, ResourceState};

    use super::*;
    use crate::OperationError;
    use crate::mocks::{MockCloud, MockControlPlane, MockEventLog, MockScalingGroups, log_entry};

    fn pool(name: &str) -> NodePoolStatus {
        NodePoolStatus {
            name: name.to_string(),
            scaling_group_id: MockScalingGroups::group_id(name),
            scaling_configuration_id: format!("scfg-{name}"),
            instance_count: 1,
            instance_ids: Vec::new(),
        }
    }

    fn input() -> DeprovisionInput {
        DeprovisionInput {
            cluster_id: "c-3".to_string(),
            node_pools: vec![pool("system"), pool("batch")],
        }
    }

    fn cloud() -> MockCloud {
        MockCloud::new()
            .with_control_plane(MockControlPlane::new().with_existing_cluster("c-3", 2))
            .with_scaling_groups(
                MockScalingGroups::new()
                    .with_existing_group("system", 1, MinMax { min: 1, max: 1 })
                    .with_existing_group("batch", 1, MinMax { min: 1, max: 1 }),
            )
    }

    #[tokio::test(start_paused = true)]
    async fn deletes_pools_before_cluster() -> anyhow::Result<()> {
        let cloud = cloud();
        let operation =
            DeprovisionOperation::new(cloud.collaborators(), OrchestratorConfig::default());

        operation.execute(input(), &CancellationToken::new()).await?;

        assert!(cloud.scaling_groups.live_groups().is_empty());
        assert!(cloud.control_plane.is_deleted("c-3"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn running_twice_is_idempotent() -> anyhow::Result<()> {
        let cloud = cloud();
        let operation =
            DeprovisionOperation::new(cloud.collaborators(), OrchestratorConfig::default());

        operation.execute(input(), &CancellationToken::new()).await?;
        operation.execute(input(), &CancellationToken::new()).await?;

        assert_eq!(
            cloud.control_plane.calls(),
            vec!["delete_cluster c-3", "delete_cluster c-3"]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn already_missing_cluster_counts_as_deleted() -> anyhow::Result<()> {
        let cloud = MockCloud::new();
        let operation =
            DeprovisionOperation::new(cloud.collaborators(), OrchestratorConfig::default());

        operation.execute(input(), &CancellationToken::new()).await?;

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cluster_delete_carries_log_lines() {
        let cloud = MockCloud::new()
            .with_control_plane(
                MockControlPlane::new()
                    .with_existing_cluster("c-3", 2)
                    .with_states(
                        OperationKind::Delete,
                        vec![ResourceState::Transitioning, ResourceState::Failed],
                    ),
            )
            .with_event_log(MockEventLog::new().with_log(
                "c-3",
                vec![
                    log_entry(30, "Failed to delete cluster c-3"),
                    log_entry(29, "load balancer lb-9 still attached"),
                    log_entry(28, "Start to delete cluster c-3"),
                ],
            ));
        let operation =
            DeprovisionOperation::new(cloud.collaborators(), OrchestratorConfig::default());

        let result = operation
            .execute(
                DeprovisionInput {
                    cluster_id: "c-3".to_string(),
                    node_pools: Vec::new(),
                },
                &CancellationToken::new(),
            )
            .await;

        let err = result.expect_err("delete failed");
        assert!(matches!(err, OperationError::Poll(_)));
        assert!(err.to_string().contains("load balancer lb-9 still attached"));
    }
}
