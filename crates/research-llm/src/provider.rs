//! Chat completion seam

use async_trait::async_trait;
use crate::{CompletionRequest, CompletionResponse, Result};

/// A chat completion service, e.g. an OpenAI-compatible endpoint
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short provider name used in logs
    fn name(&self) -> &str;
}
