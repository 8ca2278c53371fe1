//! Seams used by the scheduler.

use async_trait::async_trait;

use dream_models::GenerationConfig;

use crate::error::VeoResult;

/// Turns a finished prompt into a remote media locator.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, config: &GenerationConfig, model: &str) -> VeoResult<String>;
}

/// Downloads the bytes behind a remote media locator.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, remote_locator: &str) -> VeoResult<Vec<u8>>;
}
