use provision_core::{ClusterDescriptor, ClusterSpec, MinMax, NodePoolStatus};

use crate::OperationError;

/// New bounds for one existing node pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePoolScale {
    pub name: String,
    pub min_max: MinMax,
}

/// State threaded through the steps of a cluster saga.
///
/// Each step reads what earlier steps recorded and adds its own results.
#[derive(Debug, Clone, Default)]
pub struct ClusterSagaData {
    pub cluster_spec: Option<ClusterSpec>,
    pub cluster_id: Option<String>,
    pub cluster: Option<ClusterDescriptor>,

    pub node_pools: Vec<NodePoolStatus>,

    pub worker_count: Option<u32>,
    pub pool_scales: Vec<NodePoolScale>,

    /// Instances waiting to be joined to the cluster.
    pub pending_instances: Vec<String>,
    pub joined_instances: Vec<String>,
}

impl ClusterSagaData {
    #[must_use]
    pub fn for_provision(spec: ClusterSpec) -> Self {
        Self {
            cluster_spec: Some(spec),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn for_existing(cluster_id: String, node_pools: Vec<NodePoolStatus>) -> Self {
        Self {
            cluster_id: Some(cluster_id),
            node_pools,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_scaling(mut self, worker_count: Option<u32>, pool_scales: Vec<NodePoolScale>) -> Self {
        self.worker_count = worker_count;
        self.pool_scales = pool_scales;
        self
    }

    pub(crate) fn require_cluster_id(&self, step: &'static str) -> Result<&str, OperationError> {
        self.cluster_id
            .as_deref()
            .ok_or(OperationError::MissingInput {
                step,
                what: "a cluster id",
            })
    }
}
