//! Saga steps that drive the provider.
//!
//! Every step receives its collaborators through its constructor and records
//! what it created in its own fields, so that compensation can undo exactly
//! that.

mod cluster;
mod instances;
mod node_pools;
mod waits;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use cluster::{CreateClusterStep, DeleteClusterStep, ResizeClusterStep};
pub use instances::{JoinInstancesStep, RecordNodePoolsStep};
pub use node_pools::{CreateNodePoolsStep, DeleteNodePoolsStep, ScaleNodePoolsStep};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
