//! Waiting for asynchronous provider resources to settle.
//!
//! [`StatePoller`] repeatedly queries a resource until it reaches a terminal
//! state, and consults the provider event log through
//! [`FailureLogCollector`] to explain failures, or to uncover failures the
//! provider reported as success.

mod failure_log;
mod poller;

pub use failure_log::FailureLogCollector;
pub use poller::{PollError, PollOutcome, StatePoller};
