//! Capability interfaces of the remote systems the orchestrator drives.
//!
//! Every implementation tags its errors with a [`ProviderErrorKind`] so that
//! "not found" and transient conditions can be told apart from other
//! failures without looking at messages.
//!
//! [`ProviderErrorKind`]: provision_core::ProviderErrorKind

mod control_plane;
mod event_log;
mod node_pool_recorder;
mod scaling_group;
mod secret_reader;

pub use control_plane::ClusterControlPlaneClient;
pub use event_log::EventLogSource;
pub use node_pool_recorder::NodePoolRecorder;
pub use scaling_group::ScalingGroupClient;
pub use secret_reader::SecretReader;
