use provision_core::{MultiError, ProviderError};
use thiserror::Error;

use crate::fanout::UnitError;
use crate::polling::PollError;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    NodePools(#[from] MultiError<UnitError<OperationError>>),

    #[error("failed to read login secret '{secret_id}'")]
    Secret {
        secret_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to record node pools of cluster '{cluster_id}'")]
    Record {
        cluster_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("step '{step}' needs {what}, but no earlier step provided it")]
    MissingInput {
        step: &'static str,
        what: &'static str,
    },

    #[error("node pool '{name}' does not exist on cluster '{cluster_id}'")]
    UnknownNodePool { cluster_id: String, name: String },

    #[error("'{resource_id}' disappeared while waiting for it to {kind}")]
    Vanished {
        resource_id: String,
        kind: provision_core::OperationKind,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl From<provision_saga::Cancelled> for OperationError {
    fn from(_: provision_saga::Cancelled) -> Self {
        Self::Cancelled
    }
}

pub type Result<T> = std::result::Result<T, OperationError>;
