//! LLM provider trait

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A chat completion backend
///
/// The executor only ever sees this trait, so tests swap in scripted
/// providers and deployments can point at any OpenAI-compatible server.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Run one completion over the full conversation in `request`
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short provider name used in logs
    fn name(&self) -> &str;
}
