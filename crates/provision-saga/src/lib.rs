//! Saga pattern for compensable multi-step provisioning workflows.
//!
//! This crate provides infrastructure for executing multi-step asynchronous
//! operations with automatic rollback on failure. Each step produces an output
//! that becomes the next step's input, and stores the original input for
//! compensation. Runs accept a cancellation token that is handed to every
//! step; cancellation is a terminal failure that still compensates completed
//! steps and the step it interrupted.

mod audit;
mod builder;
mod cloneable;
mod erased;
mod error;
mod saga;
mod step;

pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use builder::SagaBuilder;
pub use error::{Cancelled, CompensationError};
pub use saga::Saga;
pub use step::SagaStep;
pub use tokio_util::sync::CancellationToken;
