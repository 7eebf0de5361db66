pub mod error;
mod multi_error;
pub mod types;

pub use error::*;
pub use multi_error::MultiError;
pub use types::*;
