use async_trait::async_trait;
use provision_core::{
    MinMax, Result, ScalingGroup, ScalingGroupDescriptor, ScalingGroupSpec, ScalingInstances,
};

#[async_trait]
pub trait ScalingGroupClient: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the scaling group or its configuration cannot be created.
    async fn create_scaling_group(&self, spec: &ScalingGroupSpec) -> Result<ScalingGroup>;

    /// # Errors
    ///
    /// Returns a `NotFound` error if the scaling group does not exist.
    async fn describe_scaling_group(&self, scaling_group_id: &str) -> Result<ScalingGroupDescriptor>;

    /// # Errors
    ///
    /// Returns an error if the new bounds are rejected.
    async fn modify_scaling_group(&self, scaling_group_id: &str, min_max: MinMax) -> Result<()>;

    /// # Errors
    ///
    /// Returns a `NotFound` error if the scaling group does not exist.
    async fn delete_scaling_group(&self, scaling_group_id: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns a `NotFound` error if the scaling group does not exist.
    async fn describe_scaling_instances(&self, scaling_group_id: &str) -> Result<ScalingInstances>;
}
