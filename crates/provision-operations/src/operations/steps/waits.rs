use provision_core::{ClusterDescriptor, OperationKind, ScalingGroupDescriptor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::polling::StatePoller;
use crate::traits::{ClusterControlPlaneClient, ScalingGroupClient};
use crate::{OperationError, Result};

pub(super) async fn cluster_settled(
    poller: &StatePoller,
    control_plane: &dyn ClusterControlPlaneClient,
    cluster_id: &str,
    kind: OperationKind,
    cancel: &CancellationToken,
) -> Result<ClusterDescriptor> {
    poller
        .wait_for(cluster_id, kind, cancel, move || async move {
            control_plane
                .describe_cluster(cluster_id)
                .await
                .map(|descriptor| (descriptor.state, descriptor))
        })
        .await?
        .ready()
        .ok_or_else(|| OperationError::Vanished {
            resource_id: cluster_id.to_string(),
            kind,
        })
}

/// Deletes a cluster and waits until it is gone. A cluster that does not
/// exist counts as deleted.
pub(super) async fn delete_cluster(
    poller: &StatePoller,
    control_plane: &dyn ClusterControlPlaneClient,
    cluster_id: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    match control_plane.delete_cluster(cluster_id).await {
        Ok(()) => {}
        Err(error) if error.is_not_found() => {
            debug!(cluster_id, "cluster already deleted");
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    }

    poller
        .wait_for(cluster_id, OperationKind::Delete, cancel, move || async move {
            control_plane
                .describe_cluster(cluster_id)
                .await
                .map(|descriptor| (descriptor.state, ()))
        })
        .await?;
    debug!(cluster_id, "cluster deleted");
    Ok(())
}

pub(super) async fn scaling_group_settled(
    poller: &StatePoller,
    scaling_groups: &dyn ScalingGroupClient,
    scaling_group_id: &str,
    kind: OperationKind,
    cancel: &CancellationToken,
) -> Result<ScalingGroupDescriptor> {
    poller
        .wait_for(scaling_group_id, kind, cancel, move || async move {
            scaling_groups
                .describe_scaling_group(scaling_group_id)
                .await
                .map(|descriptor| (descriptor.state, descriptor))
        })
        .await?
        .ready()
        .ok_or_else(|| OperationError::Vanished {
            resource_id: scaling_group_id.to_string(),
            kind,
        })
}

/// Deletes a scaling group and waits until it is gone. A scaling group that
/// does not exist counts as deleted.
pub(super) async fn delete_scaling_group(
    poller: &StatePoller,
    scaling_groups: &dyn ScalingGroupClient,
    scaling_group_id: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    match scaling_groups.delete_scaling_group(scaling_group_id).await {
        Ok(()) => {}
        Err(error) if error.is_not_found() => {
            debug!(scaling_group_id, "scaling group already deleted");
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    }

    poller
        .wait_for(scaling_group_id, OperationKind::Delete, cancel, move || async move {
            scaling_groups
                .describe_scaling_group(scaling_group_id)
                .await
                .map(|descriptor| (descriptor.state, ()))
        })
        .await?;
    debug!(scaling_group_id, "scaling group deleted");
    Ok(())
}
