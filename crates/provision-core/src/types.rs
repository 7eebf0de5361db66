use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Provider-reported status of a polled resource.
///
/// Only the provider mutates this; the orchestrator reads it repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Pending,
    Transitioning,
    Succeeded,
    Failed,
    Unknown,
}

impl ResourceState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Transitioning => "transitioning",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}


/// The kind of provider operation being awaited.
///
/// Each kind has its own pair of event-log markers and its own rules for
/// interpreting terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Scale,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Scale => "scale",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// Event-log lines that open and close one attempt of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPair {
    pub start: String,
    pub end: String,
}

impl MarkerPair {
    #[must_use]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// One line of a provider event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl FailureLogEntry {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.message
        )
    }
}


/// Desired shape of one node pool: the unit of fan-out work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolSpec {
    pub name: String,
    pub instance_type: String,
    pub desired_count: u32,
    pub min_count: u32,
    pub max_count: u32,
    pub system_disk_gb: u32,
    pub image_id: String,
}

impl NodePoolSpec {
    #[must_use]
    pub fn min_max(&self) -> MinMax {
        MinMax {
            min: self.min_count,
            max: self.max_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub region: String,
    pub kubernetes_version: String,
    /// Secret holding the key pair used to log in to worker nodes.
    pub login_secret_id: Option<String>,
    pub node_pools: Vec<NodePoolSpec>,
}

/// What is sent to the control plane when creating a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRequest {
    pub name: String,
    pub region: String,
    pub kubernetes_version: String,
    pub key_pair: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    pub cluster_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub cluster_id: String,
    pub name: String,
    pub state: ResourceState,
    pub worker_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterScaleRequest {
    pub worker_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingGroupSpec {
    pub cluster_id: String,
    pub node_pool: NodePoolSpec,
}

/// Identifiers of a freshly created scaling group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingGroup {
    pub scaling_group_id: String,
    pub scaling_configuration_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingGroupDescriptor {
    pub scaling_group_id: String,
    pub state: ResourceState,
    pub min_max: MinMax,
}

/// A machine running inside a scaling group.
///
/// Instances are compared by `instance_id` only; the remaining fields are
/// provider-mutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingInstance {
    pub instance_id: String,
    pub lifecycle_state: String,
    pub health_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingInstances {
    pub total_count: u32,
    pub instances: Vec<ScalingInstance>,
}

impl ScalingInstances {
    #[must_use]
    pub fn instance_ids(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.instance_id.clone()).collect()
    }
}

/// Identifiers the enclosing cluster model persists for each node pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolStatus {
    pub name: String,
    pub scaling_group_id: String,
    pub scaling_configuration_id: String,
    pub instance_count: u32,
    pub instance_ids: Vec<String>,
}
