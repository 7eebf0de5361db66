use async_trait::async_trait;
use provision_core::Result;

#[async_trait]
pub trait SecretReader: Send + Sync {
    /// Returns the value stored under `secret_id`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if no such secret exists.
    async fn read_secret(&self, secret_id: &str) -> Result<String>;
}
