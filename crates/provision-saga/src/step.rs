use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A step in a saga that can be executed and compensated.
///
/// Each step transforms an input into an output, with the ability to undo
/// its effects if a later step fails. The input is stored for compensation.
/// Steps that create remote resources keep whatever identifiers they need for
/// undo in their own fields; compensation never sees the step's output.
///
/// # Type Parameters
///
/// - `Input`: Data received from the previous step (or saga entry point)
/// - `Output`: Data produced for the next step
/// - `Context`: Shared read-only settings for the run
/// - `Error`: The error type for step failures
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Data received from the previous step or saga entry point.
    type Input: Clone + Send + 'static;

    /// Data produced for the next step.
    type Output: Clone + Send + 'static;

    /// Shared context for the run.
    type Context: Sync;

    /// Error type for step failures.
    type Error: Send;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> &'static str;

    /// Execute the step, transforming input into output.
    ///
    /// Long-running steps should observe `cancel` and return early once it
    /// fires. The saga waits for the step to return; an error returned after
    /// cancellation marks the step as interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails to complete.
    async fn execute(
        &self,
        ctx: &Self::Context,
        input: Self::Input,
        cancel: &CancellationToken,
    ) -> Result<Self::Output, Self::Error>;

    /// Compensate (undo) the step's effects.
    ///
    /// Called during rollback when a later step fails, or when this step was
    /// interrupted by cancellation. Receives the original input that was
    /// passed to `execute()`. Called at most once per run. An interrupted step
    /// may have done only part of its work, so it should undo exactly what it
    /// recorded.
    ///
    /// The default implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    async fn compensate(&self, ctx: &Self::Context, input: Self::Input) -> Result<(), Self::Error> {
        let _ = (ctx, input);
        Ok(())
    }

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}
