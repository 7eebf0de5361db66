use async_trait::async_trait;
use provision_core::{FailureLogEntry, Result};

#[async_trait]
pub trait EventLogSource: Send + Sync {
    /// Returns the resource's event log, newest entry first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be fetched.
    async fn get_event_log(&self, resource_id: &str) -> Result<Vec<FailureLogEntry>>;
}
