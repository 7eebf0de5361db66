use async_trait::async_trait;
use provision_core::{NodePoolStatus, Result};

/// Persists node-pool identifiers on the enclosing cluster model.
#[async_trait]
pub trait NodePoolRecorder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the identifiers cannot be stored.
    async fn record_node_pools(&self, cluster_id: &str, node_pools: &[NodePoolStatus])
    -> Result<()>;
}
