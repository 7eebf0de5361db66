//! Bounded concurrent execution of independent units of work.
//!
//! A fixed number of workers pull units from a shared queue and publish one
//! report per unit, tagged with the unit's identity. Reports are correlated
//! by identity, so the order in which workers finish never matters; results
//! come back in dispatch order. Every failed unit is reported, not only the
//! first.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use provision_core::{MultiError, NodePoolSpec, NodePoolStatus};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A unit of fan-out work with a stable identity.
pub trait FanOutUnit {
    fn unit_id(&self) -> &str;
}

impl FanOutUnit for NodePoolSpec {
    fn unit_id(&self) -> &str {
        &self.name
    }
}

impl FanOutUnit for NodePoolStatus {
    fn unit_id(&self) -> &str {
        &self.name
    }
}

impl FanOutUnit for String {
    fn unit_id(&self) -> &str {
        self
    }
}

#[derive(Debug, Error)]
pub enum UnitError<E> {
    #[error("'{unit}': {source}")]
    Failed { unit: String, source: E },

    #[error("'{unit}': not started because the operation was cancelled")]
    Skipped { unit: String },

    #[error("'{unit}': worker stopped before reporting a result")]
    Lost { unit: String },
}

impl<E> UnitError<E> {
    #[must_use]
    pub fn unit(&self) -> &str {
        match self {
            Self::Failed { unit, .. } | Self::Skipped { unit } | Self::Lost { unit } => unit,
        }
    }
}

/// Results of one fan-out run.
#[derive(Debug)]
pub struct FanOutReport<R, E> {
    succeeded: Vec<R>,
    errors: MultiError<UnitError<E>>,
}

impl<R, E> FanOutReport<R, E> {
    /// Results of the units that succeeded, in dispatch order.
    #[must_use]
    pub fn succeeded(&self) -> &[R] {
        &self.succeeded
    }

    #[must_use]
    pub fn errors(&self) -> &MultiError<UnitError<E>> {
        &self.errors
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<R>, Option<MultiError<UnitError<E>>>) {
        (self.succeeded, self.errors.err_or_none())
    }

    /// # Errors
    ///
    /// Returns every unit error if at least one unit did not succeed.
    pub fn into_result(self) -> Result<Vec<R>, MultiError<UnitError<E>>> {
        match self.errors.err_or_none() {
            None => Ok(self.succeeded),
            Some(errors) => Err(errors),
        }
    }
}

enum UnitOutcome<R, E> {
    Finished(Result<R, E>),
    Skipped,
}

struct UnitReport<R, E> {
    index: usize,
    unit: String,
    outcome: UnitOutcome<R, E>,
}

/// Runs units of work on a bounded pool of workers.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    max_concurrency: usize,
}

impl FanOut {
    /// A bound of zero is treated as one.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs `work` once per unit with at most `max_concurrency` units in flight.
    ///
    /// Units not yet started when `cancel` fires are reported as skipped;
    /// units in flight receive the token and decide for themselves. A unit
    /// whose worker panics is reported as lost.
    pub async fn run<U, R, E, F, Fut>(
        &self,
        units: Vec<U>,
        cancel: &CancellationToken,
        work: F,
    ) -> FanOutReport<R, E>
    where
        U: FanOutUnit + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(U, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let total = units.len();
        let unit_ids: Vec<String> = units.iter().map(|unit| unit.unit_id().to_string()).collect();
        let workers = self.max_concurrency.min(total);
        debug!(units = total, workers, "starting fan-out");

        let queue = Arc::new(Mutex::new(
            units.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));
        let (sender, mut receiver) = mpsc::channel::<UnitReport<R, E>>(total.max(1));
        let work = Arc::new(work);
        let mut pool = JoinSet::new();

        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let sender = sender.clone();
            let work = Arc::clone(&work);
            let cancel = cancel.clone();
            pool.spawn(async move {
                while let Some((index, unit)) = next_unit(&queue) {
                    let unit_id = unit.unit_id().to_string();
                    let outcome = if cancel.is_cancelled() {
                        UnitOutcome::Skipped
                    } else {
                        UnitOutcome::Finished((*work)(unit, cancel.clone()).await)
                    };
                    let report = UnitReport {
                        index,
                        unit: unit_id,
                        outcome,
                    };
                    if sender.send(report).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(sender);

        let mut reports: Vec<Option<UnitReport<R, E>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        while let Some(report) = receiver.recv().await {
            if let Some(slot) = reports.get_mut(report.index) {
                *slot = Some(report);
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "fan-out worker stopped abnormally");
            }
        }

        let mut succeeded = Vec::with_capacity(total);
        let mut errors = MultiError::new();
        for (report, unit) in reports.into_iter().zip(unit_ids) {
            match report {
                Some(UnitReport {
                    outcome: UnitOutcome::Finished(Ok(result)),
                    ..
                }) => succeeded.push(result),
                Some(UnitReport {
                    unit,
                    outcome: UnitOutcome::Finished(Err(source)),
                    ..
                }) => errors.push(UnitError::Failed { unit, source }),
                Some(UnitReport {
                    unit,
                    outcome: UnitOutcome::Skipped,
                    ..
                }) => errors.push(UnitError::Skipped { unit }),
                None => errors.push(UnitError::Lost { unit }),
            }
        }

        debug!(
            succeeded = succeeded.len(),
            failed = errors.len(),
            "fan-out finished"
        );
        FanOutReport { succeeded, errors }
    }
}

fn next_unit<U>(queue: &Mutex<VecDeque<(usize, U)>>) -> Option<(usize, U)> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}
