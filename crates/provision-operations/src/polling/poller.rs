use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use provision_config::{FailureMarkers, PollSettings};
use provision_core::{FailureLogEntry, OperationKind, ProviderError, ResourceState};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::FailureLogCollector;
use crate::traits::EventLogSource;

/// How a wait ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<D> {
    /// The resource reached its success state; carries the last description.
    Ready(D),
    /// The resource no longer exists. Only produced while waiting for a delete.
    Gone,
}

impl<D> PollOutcome<D> {
    #[must_use]
    pub fn ready(self) -> Option<D> {
        match self {
            Self::Ready(descriptor) => Some(descriptor),
            Self::Gone => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to query '{resource_id}': {source}")]
    Query {
        resource_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("{kind} of '{resource_id}' failed{}", render_log(.logs))]
    Failed {
        resource_id: String,
        kind: OperationKind,
        logs: Vec<String>,
    },

    #[error(
        "{kind} of '{resource_id}' reported success, but its event log records a failure{}",
        render_log(.logs)
    )]
    FailedDespiteSuccess {
        resource_id: String,
        kind: OperationKind,
        logs: Vec<String>,
    },

    #[error("waiting for '{resource_id}' was cancelled")]
    Cancelled { resource_id: String },

    #[error("'{resource_id}' did not finish its {kind} within {}s", .deadline.as_secs())]
    DeadlineExceeded {
        resource_id: String,
        kind: OperationKind,
        deadline: Duration,
    },
}

impl PollError {
    /// Event-log lines attached to a terminal failure.
    #[must_use]
    pub fn logs(&self) -> &[String] {
        match self {
            Self::Failed { logs, .. } | Self::FailedDespiteSuccess { logs, .. } => logs,
            _ => &[],
        }
    }
}

fn render_log(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    format!(":\n  {}", lines.join("\n  "))
}

/// Waits for provider resources to reach a terminal state.
#[derive(Clone)]
pub struct StatePoller {
    settings: PollSettings,
    markers: FailureMarkers,
    event_log: Arc<dyn EventLogSource>,
}

impl StatePoller {
    #[must_use]
    pub fn new(
        settings: PollSettings,
        markers: FailureMarkers,
        event_log: Arc<dyn EventLogSource>,
    ) -> Self {
        Self {
            settings,
            markers,
            event_log,
        }
    }

    #[must_use]
    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Queries `fetch` until the resource settles.
    ///
    /// The first query happens immediately; later ones are spaced by the
    /// configured interval. Transient query errors are retried. While waiting
    /// for a delete, a not-found error ends the wait with [`PollOutcome::Gone`].
    /// A scale that reports success is checked against the event log, since
    /// some providers report success for scale attempts that failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource fails, a query fails permanently, the
    /// deadline passes, or `cancel` fires.
    pub async fn wait_for<D, F, Fut>(
        &self,
        resource_id: &str,
        kind: OperationKind,
        cancel: &CancellationToken,
        mut fetch: F,
    ) -> Result<PollOutcome<D>, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = provision_core::Result<(ResourceState, D)>>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(resource_id));
            }
            attempts += 1;
            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(resource_id)),
                fetched = fetch() => fetched,
            };

            match fetched {
                Ok((ResourceState::Succeeded, descriptor)) => {
                    debug!(resource_id, %kind, attempts, "resource settled");
                    return self.confirm_success(resource_id, kind, descriptor).await;
                }
                Ok((ResourceState::Failed, _)) => {
                    return Err(self.explain_failure(resource_id, kind).await);
                }
                Ok((state, _)) => {
                    debug!(resource_id, %kind, %state, attempts, "resource not settled yet");
                }
                Err(error) if kind == OperationKind::Delete && error.is_not_found() => {
                    debug!(resource_id, attempts, "resource is gone");
                    return Ok(PollOutcome::Gone);
                }
                Err(error) if error.is_transient() => {
                    warn!(resource_id, %kind, error = %error, "transient query error, retrying");
                }
                Err(source) => {
                    return Err(PollError::Query {
                        resource_id: resource_id.to_string(),
                        source,
                    });
                }
            }

            let mut pause = self.settings.interval();
            if let Some(deadline) = self.settings.deadline() {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    return Err(PollError::DeadlineExceeded {
                        resource_id: resource_id.to_string(),
                        kind,
                        deadline,
                    });
                }
                pause = pause.min(deadline - elapsed);
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(resource_id)),
                () = tokio::time::sleep(pause) => {}
            }
        }
    }

    async fn confirm_success<D>(
        &self,
        resource_id: &str,
        kind: OperationKind,
        descriptor: D,
    ) -> Result<PollOutcome<D>, PollError> {
        if kind != OperationKind::Scale {
            return Ok(PollOutcome::Ready(descriptor));
        }

        let Some(entries) = self.event_log_of(resource_id).await else {
            return Ok(PollOutcome::Ready(descriptor));
        };

        match FailureLogCollector::new(self.markers.for_kind(kind)).latest_attempt_failure(&entries) {
            Some(logs) => Err(PollError::FailedDespiteSuccess {
                resource_id: resource_id.to_string(),
                kind,
                logs,
            }),
            None => Ok(PollOutcome::Ready(descriptor)),
        }
    }

    async fn explain_failure(&self, resource_id: &str, kind: OperationKind) -> PollError {
        let collector = FailureLogCollector::new(self.markers.for_kind(kind));
        let logs = self
            .event_log_of(resource_id)
            .await
            .map(|entries| collector.extract(&entries))
            .unwrap_or_default();

        PollError::Failed {
            resource_id: resource_id.to_string(),
            kind,
            logs,
        }
    }

    async fn event_log_of(&self, resource_id: &str) -> Option<Vec<FailureLogEntry>> {
        match self.event_log.get_event_log(resource_id).await {
            Ok(entries) => Some(entries),
            Err(error) => {
                warn!(resource_id, error = %error, "could not fetch event log");
                None
            }
        }
    }
}

fn cancelled(resource_id: &str) -> PollError {
    PollError::Cancelled {
        resource_id: resource_id.to_string(),
    }
}
