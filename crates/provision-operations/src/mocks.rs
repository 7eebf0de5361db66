use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use provision_core::{
    ClusterDescriptor, ClusterHandle, ClusterRequest, ClusterScaleRequest, ClusterSpec,
    FailureLogEntry, MinMax, NodePoolSpec, NodePoolStatus, OperationKind, ProviderError,
    ResourceState, Result, ScalingGroup, ScalingGroupDescriptor, ScalingGroupSpec,
    ScalingInstance, ScalingInstances,
};

use crate::operations::Collaborators;
use crate::traits::{
    ClusterControlPlaneClient, EventLogSource, NodePoolRecorder, ScalingGroupClient, SecretReader,
};

const DEFAULT_STATES: [ResourceState; 2] = [ResourceState::Transitioning, ResourceState::Succeeded];

fn advance(states: &mut VecDeque<ResourceState>) -> ResourceState {
    let next = if states.len() > 1 {
        states.pop_front()
    } else {
        states.front().copied()
    };
    next.unwrap_or(ResourceState::Succeeded)
}

#[must_use]
pub fn node_pool(name: &str, desired: u32, min: u32, max: u32) -> NodePoolSpec {
    NodePoolSpec {
        name: name.to_string(),
        instance_type: "ecs.g6.large".to_string(),
        desired_count: desired,
        min_count: min,
        max_count: max,
        system_disk_gb: 120,
        image_id: "img-k8s-1.29".to_string(),
    }
}

#[must_use]
pub fn cluster_spec(name: &str, node_pools: Vec<NodePoolSpec>) -> ClusterSpec {
    ClusterSpec {
        name: name.to_string(),
        region: "eu-central-1".to_string(),
        kubernetes_version: "1.29.3".to_string(),
        login_secret_id: None,
        node_pools,
    }
}

/// # Panics
///
/// Panics if `second` is not a valid second of a minute.
#[must_use]
pub fn log_entry(second: u32, message: &str) -> FailureLogEntry {
    let timestamp = Utc
        .with_ymd_and_hms(2024, 6, 1, 8, 0, second)
        .single()
        .expect("valid timestamp");
    FailureLogEntry::new(timestamp, message)
}

struct MockCluster {
    descriptor: ClusterDescriptor,
    states: VecDeque<ResourceState>,
    deleted: bool,
    attached: Vec<String>,
}

pub struct MockControlPlane {
    clusters: Mutex<BTreeMap<String, MockCluster>>,
    scripts: HashMap<OperationKind, Vec<ResourceState>>,
    create_error: Option<ProviderError>,
    transient_describe_failures: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl MockControlPlane {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clusters: Mutex::new(BTreeMap::new()),
            scripts: HashMap::new(),
            create_error: None,
            transient_describe_failures: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// States reported while an operation of `kind` is in progress.
    #[must_use]
    pub fn with_states(mut self, kind: OperationKind, states: Vec<ResourceState>) -> Self {
        self.scripts.insert(kind, states);
        self
    }

    #[must_use]
    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(ProviderError::other(message));
        self
    }

    #[must_use]
    pub fn with_transient_describe_failures(self, count: u32) -> Self {
        *self.transient_describe_failures.lock().expect("mock lock") = count;
        self
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn with_existing_cluster(self, cluster_id: &str, worker_count: u32) -> Self {
        self.clusters.lock().expect("mock lock").insert(
            cluster_id.to_string(),
            MockCluster {
                descriptor: ClusterDescriptor {
                    cluster_id: cluster_id.to_string(),
                    name: cluster_id.to_string(),
                    state: ResourceState::Succeeded,
                    worker_count,
                },
                states: VecDeque::from([ResourceState::Succeeded]),
                deleted: false,
                attached: Vec::new(),
            },
        );
        self
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock lock").clone()
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn is_deleted(&self, cluster_id: &str) -> bool {
        self.clusters
            .lock()
            .expect("mock lock")
            .get(cluster_id)
            .is_some_and(|cluster| cluster.deleted)
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn attached_instances(&self, cluster_id: &str) -> Vec<String> {
        self.clusters
            .lock()
            .expect("mock lock")
            .get(cluster_id)
            .map(|cluster| cluster.attached.clone())
            .unwrap_or_default()
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn worker_count(&self, cluster_id: &str) -> Option<u32> {
        self.clusters
            .lock()
            .expect("mock lock")
            .get(cluster_id)
            .map(|cluster| cluster.descriptor.worker_count)
    }

    fn script(&self, kind: OperationKind) -> VecDeque<ResourceState> {
        self.scripts
            .get(&kind)
            .map_or_else(|| VecDeque::from(DEFAULT_STATES), |states| states.iter().copied().collect())
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("mock lock").push(call);
    }
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

fn cluster_not_found(cluster_id: &str) -> ProviderError {
    ProviderError::not_found(format!("cluster {cluster_id} not found"))
}

#[async_trait]
impl ClusterControlPlaneClient for MockControlPlane {
    async fn create_cluster(&self, request: &ClusterRequest) -> Result<ClusterHandle> {
        self.record(format!("create_cluster {}", request.name));
        if let Some(error) = &self.create_error {
            return Err(error.clone());
        }

        let mut clusters = self.clusters.lock().expect("mock lock");
        let cluster_id = format!("c-{}", clusters.len() + 1);
        let states = self.script(OperationKind::Create);
        clusters.insert(
            cluster_id.clone(),
            MockCluster {
                descriptor: ClusterDescriptor {
                    cluster_id: cluster_id.clone(),
                    name: request.name.clone(),
                    state: ResourceState::Pending,
                    worker_count: 0,
                },
                states,
                deleted: false,
                attached: Vec::new(),
            },
        );
        Ok(ClusterHandle { cluster_id })
    }

    async fn describe_cluster(&self, cluster_id: &str) -> Result<ClusterDescriptor> {
        {
            let mut remaining = self.transient_describe_failures.lock().expect("mock lock");
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::transient("read timeout"));
            }
        }

        let mut clusters = self.clusters.lock().expect("mock lock");
        match clusters.get_mut(cluster_id) {
            Some(cluster) if !cluster.deleted => {
                cluster.descriptor.state = advance(&mut cluster.states);
                Ok(cluster.descriptor.clone())
            }
            _ => Err(cluster_not_found(cluster_id)),
        }
    }

    async fn delete_cluster(&self, cluster_id: &str) -> Result<()> {
        self.record(format!("delete_cluster {cluster_id}"));
        let delete_script = self.scripts.get(&OperationKind::Delete);
        let mut clusters = self.clusters.lock().expect("mock lock");
        match clusters.get_mut(cluster_id) {
            Some(cluster) if !cluster.deleted => {
                match delete_script {
                    Some(states) => cluster.states = states.iter().copied().collect(),
                    None => cluster.deleted = true,
                }
                Ok(())
            }
            _ => Err(cluster_not_found(cluster_id)),
        }
    }

    async fn scale_cluster(&self, cluster_id: &str, request: &ClusterScaleRequest) -> Result<()> {
        self.record(format!("scale_cluster {cluster_id} {}", request.worker_count));
        let states = self.script(OperationKind::Scale);
        let mut clusters = self.clusters.lock().expect("mock lock");
        match clusters.get_mut(cluster_id) {
            Some(cluster) if !cluster.deleted => {
                cluster.descriptor.worker_count = request.worker_count;
                cluster.states = states;
                Ok(())
            }
            _ => Err(cluster_not_found(cluster_id)),
        }
    }

    async fn attach_instances(&self, cluster_id: &str, instance_ids: &[String]) -> Result<()> {
        self.record(format!("attach_instances {cluster_id} {}", instance_ids.len()));
        let states = self.script(OperationKind::Scale);
        let mut clusters = self.clusters.lock().expect("mock lock");
        match clusters.get_mut(cluster_id) {
            Some(cluster) if !cluster.deleted => {
                cluster.attached.extend(instance_ids.iter().cloned());
                cluster.descriptor.worker_count += u32::try_from(instance_ids.len()).unwrap_or(u32::MAX);
                cluster.states = states;
                Ok(())
            }
            _ => Err(cluster_not_found(cluster_id)),
        }
    }
}

struct MockGroup {
    pool: String,
    descriptor: ScalingGroupDescriptor,
    states: VecDeque<ResourceState>,
    instances: Vec<ScalingInstance>,
    next_instance: u32,
    deleted: bool,
}

impl MockGroup {
    fn resize(&mut self, count: u32) {
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        for instance in &mut self.instances {
            instance.lifecycle_state = "InService".to_string();
        }
        while self.instances.len() < count {
            self.next_instance += 1;
            self.instances.push(ScalingInstance {
                instance_id: format!("i-{}-{}", self.pool, self.next_instance),
                lifecycle_state: "Pending".to_string(),
                health_status: "Healthy".to_string(),
            });
        }
        self.instances.truncate(count);
    }
}

pub struct MockScalingGroups {
    groups: Mutex<BTreeMap<String, MockGroup>>,
    scripts: HashMap<(String, OperationKind), Vec<ResourceState>>,
    create_failures: HashMap<String, String>,
    modify_failures: HashMap<String, String>,
    create_delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockScalingGroups {
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(BTreeMap::new()),
            scripts: HashMap::new(),
            create_failures: HashMap::new(),
            modify_failures: HashMap::new(),
            create_delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Scaling group ids are derived from pool names: `asg-<pool>`.
    #[must_use]
    pub fn group_id(pool: &str) -> String {
        format!("asg-{pool}")
    }

    #[must_use]
    pub fn with_states(mut self, pool: &str, kind: OperationKind, states: Vec<ResourceState>) -> Self {
        self.scripts.insert((pool.to_string(), kind), states);
        self
    }

    #[must_use]
    pub fn failing_create(mut self, pool: &str, message: &str) -> Self {
        self.create_failures.insert(pool.to_string(), message.to_string());
        self
    }

    #[must_use]
    pub fn failing_modify(mut self, pool: &str, message: &str) -> Self {
        self.modify_failures.insert(pool.to_string(), message.to_string());
        self
    }

    #[must_use]
    pub fn with_create_delay(mut self, pool: &str, delay: Duration) -> Self {
        self.create_delays.insert(pool.to_string(), delay);
        self
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn with_existing_group(self, pool: &str, instances: u32, min_max: MinMax) -> Self {
        let mut group = MockGroup {
            pool: pool.to_string(),
            descriptor: ScalingGroupDescriptor {
                scaling_group_id: Self::group_id(pool),
                state: ResourceState::Succeeded,
                min_max,
            },
            states: VecDeque::from([ResourceState::Succeeded]),
            instances: Vec::new(),
            next_instance: 0,
            deleted: false,
        };
        group.resize(instances);
        self.groups
            .lock()
            .expect("mock lock")
            .insert(Self::group_id(pool), group);
        self
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock lock").clone()
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn live_groups(&self) -> Vec<String> {
        self.groups
            .lock()
            .expect("mock lock")
            .iter()
            .filter(|(_, group)| !group.deleted)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn min_max(&self, scaling_group_id: &str) -> Option<MinMax> {
        self.groups
            .lock()
            .expect("mock lock")
            .get(scaling_group_id)
            .map(|group| group.descriptor.min_max)
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn instance_ids(&self, scaling_group_id: &str) -> Vec<String> {
        self.groups
            .lock()
            .expect("mock lock")
            .get(scaling_group_id)
            .map(|group| group.instances.iter().map(|i| i.instance_id.clone()).collect())
            .unwrap_or_default()
    }

    fn script(&self, pool: &str, kind: OperationKind) -> VecDeque<ResourceState> {
        self.scripts
            .get(&(pool.to_string(), kind))
            .map_or_else(|| VecDeque::from(DEFAULT_STATES), |states| states.iter().copied().collect())
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("mock lock").push(call);
    }
}

impl Default for MockScalingGroups {
    fn default() -> Self {
        Self::new()
    }
}

fn group_not_found(scaling_group_id: &str) -> ProviderError {
    ProviderError::not_found(format!("scaling group {scaling_group_id} not found"))
}

#[async_trait]
impl ScalingGroupClient for MockScalingGroups {
    async fn create_scaling_group(&self, spec: &ScalingGroupSpec) -> Result<ScalingGroup> {
        let pool = &spec.node_pool;
        self.record(format!("create_scaling_group {}", pool.name));
        if let Some(delay) = self.create_delays.get(&pool.name) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(message) = self.create_failures.get(&pool.name) {
            return Err(ProviderError::other(message.clone()));
        }

        let scaling_group_id = Self::group_id(&pool.name);
        let mut group = MockGroup {
            pool: pool.name.clone(),
            descriptor: ScalingGroupDescriptor {
                scaling_group_id: scaling_group_id.clone(),
                state: ResourceState::Pending,
                min_max: pool.min_max(),
            },
            states: self.script(&pool.name, OperationKind::Create),
            instances: Vec::new(),
            next_instance: 0,
            deleted: false,
        };
        group.resize(pool.desired_count);
        self.groups
            .lock()
            .expect("mock lock")
            .insert(scaling_group_id.clone(), group);

        Ok(ScalingGroup {
            scaling_configuration_id: format!("scfg-{}", pool.name),
            scaling_group_id,
        })
    }

    async fn describe_scaling_group(&self, scaling_group_id: &str) -> Result<ScalingGroupDescriptor> {
        let mut groups = self.groups.lock().expect("mock lock");
        match groups.get_mut(scaling_group_id) {
            Some(group) if !group.deleted => {
                group.descriptor.state = advance(&mut group.states);
                Ok(group.descriptor.clone())
            }
            _ => Err(group_not_found(scaling_group_id)),
        }
    }

    async fn modify_scaling_group(&self, scaling_group_id: &str, min_max: MinMax) -> Result<()> {
        self.record(format!(
            "modify_scaling_group {scaling_group_id} {}-{}",
            min_max.min, min_max.max
        ));
        let mut groups = self.groups.lock().expect("mock lock");
        let Some(group) = groups.get_mut(scaling_group_id).filter(|group| !group.deleted) else {
            return Err(group_not_found(scaling_group_id));
        };
        if let Some(message) = self.modify_failures.get(&group.pool) {
            return Err(ProviderError::other(message.clone()));
        }

        let current = u32::try_from(group.instances.len()).unwrap_or(u32::MAX);
        group.descriptor.min_max = min_max;
        group.states = self.script(&group.pool, OperationKind::Scale);
        group.resize(current.clamp(min_max.min, min_max.max.max(min_max.min)));
        Ok(())
    }

    async fn delete_scaling_group(&self, scaling_group_id: &str) -> Result<()> {
        self.record(format!("delete_scaling_group {scaling_group_id}"));
        let mut groups = self.groups.lock().expect("mock lock");
        match groups.get_mut(scaling_group_id) {
            Some(group) if !group.deleted => {
                group.deleted = true;
                Ok(())
            }
            _ => Err(group_not_found(scaling_group_id)),
        }
    }

    async fn describe_scaling_instances(&self, scaling_group_id: &str) -> Result<ScalingInstances> {
        let groups = self.groups.lock().expect("mock lock");
        match groups.get(scaling_group_id) {
            Some(group) if !group.deleted => Ok(ScalingInstances {
                total_count: u32::try_from(group.instances.len()).unwrap_or(u32::MAX),
                instances: group.instances.clone(),
            }),
            _ => Err(group_not_found(scaling_group_id)),
        }
    }
}

pub struct MockEventLog {
    logs: HashMap<String, Vec<FailureLogEntry>>,
    unavailable: bool,
}

impl MockEventLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            logs: HashMap::new(),
            unavailable: false,
        }
    }

    /// Entries must be given newest first.
    #[must_use]
    pub fn with_log(mut self, resource_id: &str, entries: Vec<FailureLogEntry>) -> Self {
        self.logs.insert(resource_id.to_string(), entries);
        self
    }

    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

impl Default for MockEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLogSource for MockEventLog {
    async fn get_event_log(&self, resource_id: &str) -> Result<Vec<FailureLogEntry>> {
        if self.unavailable {
            return Err(ProviderError::transient("event log service unavailable"));
        }
        Ok(self.logs.get(resource_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MockSecretReader {
    secrets: HashMap<String, String>,
}

impl MockSecretReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, secret_id: &str, value: &str) -> Self {
        self.secrets.insert(secret_id.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SecretReader for MockSecretReader {
    async fn read_secret(&self, secret_id: &str) -> Result<String> {
        self.secrets
            .get(secret_id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("secret {secret_id} not found")))
    }
}

#[derive(Default)]
pub struct MockNodePoolRecorder {
    recorded: Mutex<Vec<(String, Vec<NodePoolStatus>)>>,
    failure: Option<String>,
}

impl MockNodePoolRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// # Panics
    ///
    /// Panics if the mock lock is poisoned.
    #[must_use]
    pub fn recorded(&self) -> Vec<(String, Vec<NodePoolStatus>)> {
        self.recorded.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl NodePoolRecorder for MockNodePoolRecorder {
    async fn record_node_pools(
        &self,
        cluster_id: &str,
        node_pools: &[NodePoolStatus],
    ) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(ProviderError::other(message.clone()));
        }
        self.recorded
            .lock()
            .expect("mock lock")
            .push((cluster_id.to_string(), node_pools.to_vec()));
        Ok(())
    }
}

/// One instance of every collaborator, kept so tests can inspect them afterwards.
pub struct MockCloud {
    pub control_plane: Arc<MockControlPlane>,
    pub scaling_groups: Arc<MockScalingGroups>,
    pub event_log: Arc<MockEventLog>,
    pub secrets: Arc<MockSecretReader>,
    pub recorder: Arc<MockNodePoolRecorder>,
}

impl MockCloud {
    #[must_use]
    pub fn new() -> Self {
        Self {
            control_plane: Arc::new(MockControlPlane::new()),
            scaling_groups: Arc::new(MockScalingGroups::new()),
            event_log: Arc::new(MockEventLog::new()),
            secrets: Arc::new(MockSecretReader::new()),
            recorder: Arc::new(MockNodePoolRecorder::new()),
        }
    }

    #[must_use]
    pub fn with_control_plane(mut self, control_plane: MockControlPlane) -> Self {
        self.control_plane = Arc::new(control_plane);
        self
    }

    #[must_use]
    pub fn with_scaling_groups(mut self, scaling_groups: MockScalingGroups) -> Self {
        self.scaling_groups = Arc::new(scaling_groups);
        self
    }

    #[must_use]
    pub fn with_event_log(mut self, event_log: MockEventLog) -> Self {
        self.event_log = Arc::new(event_log);
        self
    }

    #[must_use]
    pub fn with_secrets(mut self, secrets: MockSecretReader) -> Self {
        self.secrets = Arc::new(secrets);
        self
    }

    #[must_use]
    pub fn with_recorder(mut self, recorder: MockNodePoolRecorder) -> Self {
        self.recorder = Arc::new(recorder);
        self
    }

    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            control_plane: Arc::clone(&self.control_plane) as Arc<dyn ClusterControlPlaneClient>,
            scaling_groups: Arc::clone(&self.scaling_groups) as Arc<dyn ScalingGroupClient>,
            event_log: Arc::clone(&self.event_log) as Arc<dyn EventLogSource>,
            secrets: Arc::clone(&self.secrets) as Arc<dyn SecretReader>,
            node_pool_recorder: Arc::clone(&self.recorder) as Arc<dyn NodePoolRecorder>,
        }
    }
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}
