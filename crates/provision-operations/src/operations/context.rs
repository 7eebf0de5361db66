use std::sync::Arc;

use provision_config::{OrchestratorConfig, PartialFailurePolicy};

use crate::fanout::FanOut;
use crate::polling::StatePoller;
use crate::traits::{
    ClusterControlPlaneClient, EventLogSource, NodePoolRecorder, ScalingGroupClient, SecretReader,
};

/// The remote systems an operation drives.
#[derive(Clone)]
pub struct Collaborators {
    pub control_plane: Arc<dyn ClusterControlPlaneClient>,
    pub scaling_groups: Arc<dyn ScalingGroupClient>,
    pub event_log: Arc<dyn EventLogSource>,
    pub secrets: Arc<dyn SecretReader>,
    pub node_pool_recorder: Arc<dyn NodePoolRecorder>,
}

/// Run settings shared by every step of a saga.
#[derive(Clone)]
pub struct ProvisionSagaContext {
    poller: StatePoller,
    fan_out: FanOut,
    on_partial_failure: PartialFailurePolicy,
}

impl ProvisionSagaContext {
    #[must_use]
    pub fn new(config: &OrchestratorConfig, event_log: Arc<dyn EventLogSource>) -> Self {
        Self {
            poller: StatePoller::new(config.poll(), config.markers().clone(), event_log),
            fan_out: FanOut::new(config.fan_out().max_concurrency()),
            on_partial_failure: config.fan_out().on_partial_failure(),
        }
    }

    #[must_use]
    pub fn poller(&self) -> &StatePoller {
        &self.poller
    }

    #[must_use]
    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    #[must_use]
    pub fn on_partial_failure(&self) -> PartialFailurePolicy {
        self.on_partial_failure
    }
}
