use std::marker::PhantomData;

use crate::erased::{ErasedStep, StepWrapper};
use crate::saga::Saga;
use crate::step::SagaStep;

/// Builder for constructing type-safe sagas.
///
/// The builder enforces at compile-time that:
/// - Each step's input type matches the previous step's output type
/// - The saga's input type matches the first step's input
/// - The saga's output type matches the last step's output
///
/// A builder with no steps builds the identity saga, which returns its input
/// unchanged.
///
/// # Compile-time Type Safety
///
/// Mismatched types will not compile:
///
/// ```compile_fail
/// use async_trait::async_trait;
/// use provision_saga::{CancellationToken, SagaBuilder, SagaStep};
///
/// struct CreateCluster;
/// #[async_trait]
/// impl SagaStep for CreateCluster {
///     type Input = u32;
///     type Output = String;  // Outputs a cluster id
///     type Context = ();
///     type Error = ();
///     fn name(&self) -> &'static str { "create_cluster" }
///     async fn execute(&self, _: &(), input: u32, _: &CancellationToken) -> Result<String, ()> {
///         Ok(input.to_string())
///     }
/// }
///
/// struct ScalePools;
/// #[async_trait]
/// impl SagaStep for ScalePools {
///     type Input = u32;  // Expects u32, not String!
///     type Output = u32;
///     type Context = ();
///     type Error = ();
///     fn name(&self) -> &'static str { "scale_pools" }
///     async fn execute(&self, _: &(), input: u32, _: &CancellationToken) -> Result<u32, ()> {
///         Ok(input * 2)
///     }
/// }
///
/// let saga = SagaBuilder::new()
///     .then(CreateCluster)
///     .then(ScalePools)  // Compile error here!
///     .build();
/// ```
pub struct SagaBuilder<Input, Output, Ctx, Err> {
    steps: Vec<Box<dyn ErasedStep<Ctx, Err>>>,
    _phantom: PhantomData<fn(Input) -> Output>,
}

impl<Input, Ctx, Err> SagaBuilder<Input, Input, Ctx, Err> {
    /// Create a new saga builder with no steps.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            _phantom: PhantomData,
        }
    }
}

impl<Input, Ctx, Err> Default for SagaBuilder<Input, Input, Ctx, Err> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Input, CurrentOutput, Ctx, Err> SagaBuilder<Input, CurrentOutput, Ctx, Err> {
    /// Append a step to the saga.
    ///
    /// The step's input type must match the current output type.
    #[must_use]
    pub fn then<S>(self, step: S) -> SagaBuilder<Input, S::Output, Ctx, Err>
    where
        S: SagaStep<Input = CurrentOutput, Context = Ctx, Error = Err> + 'static,
    {
        let mut steps = self.steps;
        steps.push(Box::new(StepWrapper::new(step)));
        SagaBuilder {
            steps,
            _phantom: PhantomData,
        }
    }

    /// Number of steps added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Build the saga from the accumulated steps.
    #[must_use]
    pub fn build(self) -> Saga<Input, CurrentOutput, Ctx, Err> {
        Saga::from_steps(self.steps)
    }
}
