use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use provision_config::PartialFailurePolicy;
use provision_core::{
    MinMax, MultiError, NodePoolSpec, NodePoolStatus, OperationKind, ScalingGroupSpec,
    ScalingInstances,
};
use provision_saga::{CancellationToken, SagaStep};
use tracing::{debug, warn};

use super::lock;
use super::waits::{delete_scaling_group, scaling_group_settled};
use crate::fanout::{FanOutUnit, UnitError};
use crate::operations::{ClusterSagaData, ProvisionSagaContext};
use crate::polling::StatePoller;
use crate::traits::ScalingGroupClient;
use crate::{OperationError, Result};

type NodePoolErrors = MultiError<UnitError<OperationError>>;

/// The scaling group backing one node pool.
#[derive(Debug, Clone)]
struct GroupRef {
    pool: String,
    scaling_group_id: String,
}

impl From<&NodePoolStatus> for GroupRef {
    fn from(pool: &NodePoolStatus) -> Self {
        Self {
            pool: pool.name.clone(),
            scaling_group_id: pool.scaling_group_id.clone(),
        }
    }
}

impl FanOutUnit for GroupRef {
    fn unit_id(&self) -> &str {
        &self.pool
    }
}

async fn create_node_pool(
    scaling_groups: &dyn ScalingGroupClient,
    poller: &StatePoller,
    created: &Mutex<Vec<GroupRef>>,
    cluster_id: String,
    pool: NodePoolSpec,
    cancel: &CancellationToken,
) -> Result<NodePoolStatus> {
    let group = scaling_groups
        .create_scaling_group(&ScalingGroupSpec {
            cluster_id,
            node_pool: pool.clone(),
        })
        .await?;
    lock(created).push(GroupRef {
        pool: pool.name.clone(),
        scaling_group_id: group.scaling_group_id.clone(),
    });
    debug!(
        pool = %pool.name,
        scaling_group_id = %group.scaling_group_id,
        "scaling group created"
    );

    let settled = async {
        scaling_group_settled(
            poller,
            scaling_groups,
            &group.scaling_group_id,
            OperationKind::Create,
            cancel,
        )
        .await?;
        scaling_groups
            .describe_scaling_instances(&group.scaling_group_id)
            .await
            .map_err(OperationError::from)
    };
    let instances = match settled.await {
        Ok(instances) => instances,
        Err(error) => {
            if !cancel.is_cancelled() {
                warn!(
                    pool = %pool.name,
                    scaling_group_id = %group.scaling_group_id,
                    "scaling group left in place after failed creation"
                );
            }
            return Err(error);
        }
    };

    Ok(NodePoolStatus {
        name: pool.name,
        scaling_group_id: group.scaling_group_id,
        scaling_configuration_id: group.scaling_configuration_id,
        instance_count: instances.total_count,
        instance_ids: instances.instance_ids(),
    })
}

async fn delete_node_pools(
    ctx: &ProvisionSagaContext,
    scaling_groups: &Arc<dyn ScalingGroupClient>,
    groups: Vec<GroupRef>,
    cancel: &CancellationToken,
) -> std::result::Result<(), NodePoolErrors> {
    let scaling_groups = Arc::clone(scaling_groups);
    let poller = ctx.poller().clone();

    ctx.fan_out()
        .run(groups, cancel, move |group: GroupRef, cancel| {
            let scaling_groups = Arc::clone(&scaling_groups);
            let poller = poller.clone();
            async move {
                delete_scaling_group(
                    &poller,
                    scaling_groups.as_ref(),
                    &group.scaling_group_id,
                    &cancel,
                )
                .await
            }
        })
        .await
        .into_result()
        .map(|_| ())
}

/// Applies the partial-failure policy to the node pools that succeeded.
async fn release_created_pools(
    ctx: &ProvisionSagaContext,
    scaling_groups: &Arc<dyn ScalingGroupClient>,
    created: &[NodePoolStatus],
) {
    if created.is_empty() {
        return;
    }

    match ctx.on_partial_failure() {
        PartialFailurePolicy::Retain => {
            let retained: Vec<&str> = created
                .iter()
                .map(|pool| pool.scaling_group_id.as_str())
                .collect();
            warn!(
                scaling_groups = ?retained,
                "retaining scaling groups of node pools that succeeded"
            );
        }
        PartialFailurePolicy::RollBack => {
            debug!(count = created.len(), "rolling back node pools that succeeded");
            let groups = created.iter().map(GroupRef::from).collect();
            if let Err(errors) =
                delete_node_pools(ctx, scaling_groups, groups, &CancellationToken::new()).await
            {
                warn!(error = %errors, "rolling back node pools failed");
            }
        }
    }
}

/// Creates one scaling group per requested node pool, concurrently.
///
/// Every scaling group is recorded as soon as the provider accepts it, so an
/// interrupted run can delete groups that never settled.
pub struct CreateNodePoolsStep {
    scaling_groups: Arc<dyn ScalingGroupClient>,
    created: Arc<Mutex<Vec<GroupRef>>>,
}

impl CreateNodePoolsStep {
    #[must_use]
    pub fn new(scaling_groups: Arc<dyn ScalingGroupClient>) -> Self {
        Self {
            scaling_groups,
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SagaStep for CreateNodePoolsStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_node_pools"
    }

    async fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output> {
        let cluster_id = input.require_cluster_id(self.name())?.to_string();
        let pools = input
            .cluster_spec
            .as_ref()
            .map(|spec| spec.node_pools.clone())
            .unwrap_or_default();
        if pools.is_empty() {
            debug!(%cluster_id, "no node pools requested");
            return Ok(input);
        }

        debug!(%cluster_id, count = pools.len(), "creating node pools");
        let scaling_groups = Arc::clone(&self.scaling_groups);
        let poller = ctx.poller().clone();
        let created = Arc::clone(&self.created);
        let report = ctx
            .fan_out()
            .run(pools, cancel, move |pool: NodePoolSpec, cancel| {
                let scaling_groups = Arc::clone(&scaling_groups);
                let poller = poller.clone();
                let created = Arc::clone(&created);
                let cluster_id = cluster_id.clone();
                async move {
                    create_node_pool(
                        scaling_groups.as_ref(),
                        &poller,
                        &created,
                        cluster_id,
                        pool,
                        &cancel,
                    )
                    .await
                }
            })
            .await;

        let (succeeded, errors) = report.into_parts();
        if let Some(errors) = errors {
            if cancel.is_cancelled() {
                debug!("node pool creation interrupted");
                return Err(errors.into());
            }
            release_created_pools(ctx, &self.scaling_groups, &succeeded).await;
            return Err(errors.into());
        }

        input.pending_instances = succeeded
            .iter()
            .flat_map(|pool| pool.instance_ids.iter().cloned())
            .collect();
        input.node_pools = succeeded;
        Ok(input)
    }

    async fn compensate(&self, ctx: &Self::Context, _input: Self::Input) -> Result<()> {
        let created = std::mem::take(&mut *lock(&self.created));
        if created.is_empty() {
            return Ok(());
        }
        debug!(count = created.len(), "deleting created node pools");
        delete_node_pools(ctx, &self.scaling_groups, created, &CancellationToken::new())
            .await
            .map_err(OperationError::from)
    }

    fn compensation_description(&self) -> String {
        "delete the created scaling groups".to_string()
    }
}

/// Deletes the scaling groups of every known node pool, concurrently.
pub struct DeleteNodePoolsStep {
    scaling_groups: Arc<dyn ScalingGroupClient>,
}

impl DeleteNodePoolsStep {
    #[must_use]
    pub fn new(scaling_groups: Arc<dyn ScalingGroupClient>) -> Self {
        Self { scaling_groups }
    }
}

#[async_trait]
impl SagaStep for DeleteNodePoolsStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_node_pools"
    }

    async fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output> {
        let pools = std::mem::take(&mut input.node_pools);
        if pools.is_empty() {
            return Ok(input);
        }

        debug!(count = pools.len(), "deleting node pools");
        let groups = pools.iter().map(GroupRef::from).collect();
        delete_node_pools(ctx, &self.scaling_groups, groups, cancel).await?;
        Ok(input)
    }

    fn compensation_description(&self) -> String {
        "none (deleted scaling groups cannot be restored)".to_string()
    }
}

struct PoolScaleUnit {
    pool: NodePoolStatus,
    target: MinMax,
}

impl FanOutUnit for PoolScaleUnit {
    fn unit_id(&self) -> &str {
        &self.pool.name
    }
}

struct ScaledPool {
    pool: NodePoolStatus,
    new_instance_ids: Vec<String>,
}

struct BoundsRestore {
    group: GroupRef,
    min_max: MinMax,
}

impl FanOutUnit for BoundsRestore {
    fn unit_id(&self) -> &str {
        &self.group.pool
    }
}

/// Instances present after a scale that were not present before, by instance id.
fn added_instance_ids(before: &ScalingInstances, after: &ScalingInstances) -> Vec<String> {
    let known: HashSet<&str> = before
        .instances
        .iter()
        .map(|instance| instance.instance_id.as_str())
        .collect();
    after
        .instances
        .iter()
        .filter(|instance| !known.contains(instance.instance_id.as_str()))
        .map(|instance| instance.instance_id.clone())
        .collect()
}

async fn scale_node_pool(
    scaling_groups: &dyn ScalingGroupClient,
    poller: &StatePoller,
    modified: &Mutex<Vec<BoundsRestore>>,
    unit: PoolScaleUnit,
    cancel: &CancellationToken,
) -> Result<ScaledPool> {
    let PoolScaleUnit { mut pool, target } = unit;
    let scaling_group_id = pool.scaling_group_id.clone();

    let before = scaling_groups
        .describe_scaling_instances(&scaling_group_id)
        .await?;
    let previous = scaling_groups
        .describe_scaling_group(&scaling_group_id)
        .await?
        .min_max;

    scaling_groups
        .modify_scaling_group(&scaling_group_id, target)
        .await?;
    lock(modified).push(BoundsRestore {
        group: GroupRef::from(&pool),
        min_max: previous,
    });
    debug!(
        pool = %pool.name,
        %scaling_group_id,
        min = target.min,
        max = target.max,
        "scaling group bounds changed"
    );
    scaling_group_settled(
        poller,
        scaling_groups,
        &scaling_group_id,
        OperationKind::Scale,
        cancel,
    )
    .await?;

    let after = scaling_groups
        .describe_scaling_instances(&scaling_group_id)
        .await?;
    let new_instance_ids = added_instance_ids(&before, &after);
    pool.instance_count = after.total_count;
    pool.instance_ids = after.instance_ids();

    Ok(ScaledPool {
        pool,
        new_instance_ids,
    })
}

async fn restore_bounds(
    ctx: &ProvisionSagaContext,
    scaling_groups: &Arc<dyn ScalingGroupClient>,
    restores: Vec<BoundsRestore>,
) -> std::result::Result<(), NodePoolErrors> {
    let scaling_groups = Arc::clone(scaling_groups);
    let poller = ctx.poller().clone();

    ctx.fan_out()
        .run(
            restores,
            &CancellationToken::new(),
            move |restore: BoundsRestore, cancel| {
                let scaling_groups = Arc::clone(&scaling_groups);
                let poller = poller.clone();
                async move {
                    let scaling_group_id = &restore.group.scaling_group_id;
                    scaling_groups
                        .modify_scaling_group(scaling_group_id, restore.min_max)
                        .await?;
                    scaling_group_settled(
                        &poller,
                        scaling_groups.as_ref(),
                        scaling_group_id,
                        OperationKind::Scale,
                        &cancel,
                    )
                    .await
                    .map(|_| ())
                }
            },
        )
        .await
        .into_result()
        .map(|_| ())
}

/// Changes the bounds of existing node pools, concurrently, and collects the
/// instances each pool gained.
///
/// The previous bounds of a scaling group are recorded once its bounds have
/// been changed, whether or not the group then settles.
pub struct ScaleNodePoolsStep {
    scaling_groups: Arc<dyn ScalingGroupClient>,
    modified: Arc<Mutex<Vec<BoundsRestore>>>,
}

impl ScaleNodePoolsStep {
    #[must_use]
    pub fn new(scaling_groups: Arc<dyn ScalingGroupClient>) -> Self {
        Self {
            scaling_groups,
            modified: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SagaStep for ScaleNodePoolsStep {
    type Input = ClusterSagaData;
    type Output = ClusterSagaData;
    type Context = ProvisionSagaContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "scale_node_pools"
    }

    async fn execute(
        &self,
        ctx: &Self::Context,
        mut input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output> {
        if input.pool_scales.is_empty() {
            debug!("no node pool scaling requested");
            return Ok(input);
        }
        let cluster_id = input.require_cluster_id(self.name())?;

        let units = input
            .pool_scales
            .iter()
            .map(|scale| {
                input
                    .node_pools
                    .iter()
                    .find(|pool| pool.name == scale.name)
                    .map(|pool| PoolScaleUnit {
                        pool: pool.clone(),
                        target: scale.min_max,
                    })
                    .ok_or_else(|| OperationError::UnknownNodePool {
                        cluster_id: cluster_id.to_string(),
                        name: scale.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(%cluster_id, count = units.len(), "scaling node pools");
        let scaling_groups = Arc::clone(&self.scaling_groups);
        let poller = ctx.poller().clone();
        let modified = Arc::clone(&self.modified);
        let report = ctx
            .fan_out()
            .run(units, cancel, move |unit: PoolScaleUnit, cancel| {
                let scaling_groups = Arc::clone(&scaling_groups);
                let poller = poller.clone();
                let modified = Arc::clone(&modified);
                async move {
                    scale_node_pool(scaling_groups.as_ref(), &poller, &modified, unit, &cancel)
                        .await
                }
            })
            .await;

        let (scaled, errors) = report.into_parts();
        if let Some(errors) = errors {
            if cancel.is_cancelled() {
                debug!("node pool scaling interrupted");
                return Err(errors.into());
            }
            match ctx.on_partial_failure() {
                PartialFailurePolicy::RollBack => {
                    let restores = std::mem::take(&mut *lock(&self.modified));
                    debug!(count = restores.len(), "restoring bounds of changed node pools");
                    if let Err(restore_errors) =
                        restore_bounds(ctx, &self.scaling_groups, restores).await
                    {
                        warn!(error = %restore_errors, "restoring node pool bounds failed");
                    }
                }
                PartialFailurePolicy::Retain => {
                    let retained: Vec<String> = lock(&self.modified)
                        .iter()
                        .map(|restore| restore.group.pool.clone())
                        .collect();
                    warn!(node_pools = ?retained, "retaining new bounds of changed node pools");
                }
            }
            return Err(errors.into());
        }

        for ScaledPool {
            pool,
            new_instance_ids,
        } in scaled
        {
            debug!(pool = %pool.name, added = new_instance_ids.len(), "node pool scaled");
            input.pending_instances.extend(new_instance_ids);
            if let Some(existing) = input
                .node_pools
                .iter_mut()
                .find(|existing| existing.name == pool.name)
            {
                *existing = pool;
            }
        }
        Ok(input)
    }

    async fn compensate(&self, ctx: &Self::Context, _input: Self::Input) -> Result<()> {
        let restores = std::mem::take(&mut *lock(&self.modified));
        if restores.is_empty() {
            return Ok(());
        }
        debug!(count = restores.len(), "restoring node pool bounds");
        restore_bounds(ctx, &self.scaling_groups, restores)
            .await
            .map_err(OperationError::from)
    }

    fn compensation_description(&self) -> String {
        "restore the previous node pool bounds".to_string()
    }
}
