use async_trait::async_trait;
use provision_core::{
    ClusterDescriptor, ClusterHandle, ClusterRequest, ClusterScaleRequest, Result,
};

#[async_trait]
pub trait ClusterControlPlaneClient: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the provider rejects the creation request.
    async fn create_cluster(&self, request: &ClusterRequest) -> Result<ClusterHandle>;

    /// # Errors
    ///
    /// Returns a `NotFound` error if the cluster does not exist.
    async fn describe_cluster(&self, cluster_id: &str) -> Result<ClusterDescriptor>;

    /// # Errors
    ///
    /// Returns a `NotFound` error if the cluster does not exist.
    async fn delete_cluster(&self, cluster_id: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the provider rejects the scale request.
    async fn scale_cluster(&self, cluster_id: &str, request: &ClusterScaleRequest) -> Result<()>;

    /// Joins already running instances to the cluster as worker nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the attach request.
    async fn attach_instances(&self, cluster_id: &str, instance_ids: &[String]) -> Result<()>;
}
