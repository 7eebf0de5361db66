mod error;
pub mod fanout;
pub mod operations;
pub mod polling;
pub mod traits;

#[cfg(test)]
pub mod mocks;

pub use error::{OperationError, Result};
