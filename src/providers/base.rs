use async_trait::async_trait;

use crate::errors::Result;

/// Base trait for text-generation providers. The provider layer is the only
/// part of the crate with network access; everything else goes through the
/// gateway, which wraps one of these.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate a free-text completion for `prompt` using the named model.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}
