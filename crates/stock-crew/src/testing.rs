//! Test doubles shared across the crate's tests

use async_trait::async_trait;
use crew_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message,
    MessageContent, Role, StopReason, TokenUsage,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Returns queued replies in order and records every request
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<crew_llm::Result<CompletionResponse>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(self, text: &str) -> Self {
        self.push(Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::new(100, 50),
        }))
    }

    pub fn tool_call(self, id: &str, name: &str, input: serde_json::Value) -> Self {
        self.push(Ok(CompletionResponse {
            message: Message {
                role: Role::Assistant,
                content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                }])),
            },
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::new(100, 10),
        }))
    }

    pub fn error(self, error: LLMError) -> Self {
        self.push(Err(error))
    }

    fn push(self, reply: crew_llm::Result<CompletionResponse>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> crew_llm::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::RequestFailed("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Text of every message in a request, system prompt first
pub fn transcript(request: &CompletionRequest) -> String {
    let mut out = request.system.clone().unwrap_or_default();
    for message in &request.messages {
        if let Some(text) = message.text() {
            out.push('\n');
            out.push_str(&text);
        }
        if let Some(MessageContent::Blocks(blocks)) = &message.content {
            for block in blocks {
                if let ContentBlock::ToolResult { content, .. } = block {
                    out.push('\n');
                    out.push_str(content);
                }
            }
        }
    }
    out
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
