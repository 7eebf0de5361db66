use std::fmt::Display;
use std::marker::PhantomData;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::SagaAuditLog;
use crate::cloneable::CloneableAny;
use crate::erased::ErasedStep;
use crate::error::Cancelled;

/// A compiled saga ready for execution.
///
/// Sagas execute a sequence of steps, where each step's output becomes the
/// next step's input. If any step fails, previously completed steps are
/// compensated in reverse order (LIFO). Steps are never reordered and a failed
/// step is never retried by the saga itself.
///
/// A running step is never abandoned: it receives the cancellation token and
/// is expected to return early once it fires. A step that fails after
/// cancellation counts as interrupted and is compensated along with the
/// completed steps, so that it can undo whatever it recorded before stopping.
pub struct Saga<Input, Output, Ctx, Err> {
    steps: Vec<Box<dyn ErasedStep<Ctx, Err>>>,
    compensate: bool,
    _phantom: PhantomData<fn(Input) -> Output>,
}

impl<Input, Output, Ctx, Err> Saga<Input, Output, Ctx, Err> {
    pub(crate) fn from_steps(steps: Vec<Box<dyn ErasedStep<Ctx, Err>>>) -> Self {
        Self {
            steps,
            compensate: true,
            _phantom: PhantomData,
        }
    }

    /// Enable or disable compensation on failure. Enabled by default.
    #[must_use]
    pub fn with_compensation(mut self, enabled: bool) -> Self {
        self.compensate = enabled;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<Input, Output, Ctx, Err> Saga<Input, Output, Ctx, Err>
where
    Input: Clone + Send + 'static,
    Output: Send + 'static,
    Ctx: Sync,
    Err: From<Cancelled> + Display + Send,
{
    /// Execute the saga, returning the final output on success.
    ///
    /// On failure, compensates all previously completed steps in reverse order
    /// and returns the failing step's error unchanged. A saga without steps
    /// returns its input.
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that failed, or `Cancelled`
    /// converted into `Err` if `cancel` fired before the saga finished.
    pub async fn execute(
        &self,
        ctx: &Ctx,
        input: Input,
        cancel: &CancellationToken,
    ) -> Result<Output, Err> {
        let (result, _audit_log) = self.execute_internal(ctx, input, cancel).await;
        result
    }

    /// Execute the saga and return both the result and an audit log.
    ///
    /// The audit log tracks all step executions and compensations, including
    /// the messages of any compensations that failed.
    pub async fn execute_with_audit(
        &self,
        ctx: &Ctx,
        input: Input,
        cancel: &CancellationToken,
    ) -> (Result<Output, Err>, SagaAuditLog) {
        self.execute_internal(ctx, input, cancel).await
    }

    async fn execute_internal(
        &self,
        ctx: &Ctx,
        input: Input,
        cancel: &CancellationToken,
    ) -> (Result<Output, Err>, SagaAuditLog) {
        let mut audit_log = SagaAuditLog::new();
        let mut compensation_stack: Vec<(usize, Box<dyn CloneableAny>)> = Vec::new();

        let mut current: Box<dyn CloneableAny> = Box::new(input);

        info!(steps = self.steps.len(), "starting saga");

        for (index, step) in self.steps.iter().enumerate() {
            audit_log.record_start(step.name());

            if cancel.is_cancelled() {
                audit_log.record_cancelled();
                let error = self
                    .rollback(ctx, &mut audit_log, compensation_stack, step.name(), Cancelled.into())
                    .await;
                return (Err(error), audit_log);
            }

            debug!(step = step.name(), index, "executing step");
            let input_clone = current.clone_box();

            match step.execute_erased(ctx, current, cancel).await {
                Ok(output) => {
                    audit_log.record_success(step.compensation_description());
                    compensation_stack.push((index, input_clone));
                    current = output;
                }
                Err(error) if cancel.is_cancelled() => {
                    debug!(step = step.name(), error = %error, "step interrupted by cancellation");
                    audit_log.record_cancelled();
                    compensation_stack.push((index, input_clone));
                    let error = self
                        .rollback(ctx, &mut audit_log, compensation_stack, step.name(), Cancelled.into())
                        .await;
                    return (Err(error), audit_log);
                }
                Err(error) => {
                    audit_log.record_failure();
                    let error = self
                        .rollback(ctx, &mut audit_log, compensation_stack, step.name(), error)
                        .await;
                    return (Err(error), audit_log);
                }
            }
        }

        let output = current
            .into_any()
            .downcast::<Output>()
            .expect("saga builder guarantees final output type");

        info!(steps = self.steps.len(), "saga completed");
        (Ok(*output), audit_log)
    }

    async fn rollback(
        &self,
        ctx: &Ctx,
        audit_log: &mut SagaAuditLog,
        mut compensation_stack: Vec<(usize, Box<dyn CloneableAny>)>,
        failed_step: &str,
        step_error: Err,
    ) -> Err {
        warn!(step = failed_step, error = %step_error, "saga step failed");

        if !self.compensate {
            debug!(
                completed = compensation_stack.len(),
                "compensation disabled, leaving completed steps in place"
            );
            return step_error;
        }

        while let Some((index, stored_input)) = compensation_stack.pop() {
            let step = &self.steps[index];
            let step_name = step.name();

            debug!(step = step_name, "compensating step");
            match step.compensate_erased(ctx, stored_input).await {
                Ok(()) => audit_log.record_compensated(index),
                Err(error) => {
                    warn!(
                        step = step_name,
                        compensation = %step.compensation_description(),
                        error = %error,
                        "compensation failed, continuing rollback"
                    );
                    audit_log.record_compensation_failed(index, error.to_string());
                }
            }
        }

        step_error
    }
}
