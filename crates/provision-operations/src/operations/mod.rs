mod context;
mod deprovision;
mod provision;
mod saga_data;
mod scale;
pub mod steps;

pub use context::{Collaborators, ProvisionSagaContext};
pub use deprovision::{DeprovisionInput, DeprovisionOperation};
pub use provision::{ProvisionOperation, ProvisionOutput};
pub use saga_data::{ClusterSagaData, NodePoolScale};
pub use scale::{ScaleInput, ScaleOperation, ScaleOutput};
