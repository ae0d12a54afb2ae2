//! Chat completion layer for the crew runtime
//!
//! Provider-agnostic request/response types, the [`LLMProvider`] trait the
//! executor talks to, and an OpenAI-compatible provider.

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;
pub mod tools;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LLMProvider;
pub use providers::{OpenAIConfig, OpenAIProvider};
pub use tools::ToolDefinition;
