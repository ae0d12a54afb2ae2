//! Agent executor
//!
//! Runs one task for one agent as a bounded loop:
//! 1. call the model with the conversation and the agent's tools
//! 2. if it asked for tools, run them, append the results, go again
//! 3. if it answered in text, that is the final answer
//!
//! When `max_iterations` rounds pass without a text answer, the executor
//! makes one more call with tools withheld and asks for the final answer.

use async_trait::async_trait;
use crew_core::{Error, Result};
use crew_llm::{CompletionRequest, LLMProvider, Message, StopReason, TokenUsage};
use crew_tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const FORCE_FINAL_ANSWER: &str = "You have used all the tool calls you are allowed for this task. \
Do not call any more tools. Using the information you already have, reply now with your \
complete final answer.";

/// Callbacks for tool activity inside the loop
#[async_trait]
pub trait ExecutorEventHandler: Send + Sync {
    async fn on_tool_start(&self, _id: &str, _name: &str, _input: &Value) {}

    async fn on_tool_done(
        &self,
        _id: &str,
        _name: &str,
        _result: std::result::Result<&str, &str>,
        _duration_ms: u64,
    ) {
    }
}

/// Settings for one executor run
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Rounds allowed before the final answer is forced
    pub max_iterations: usize,
    pub model: String,
    pub system_prompt: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            model: "gpt-3.5-turbo".to_string(),
            system_prompt: None,
            max_tokens: 2048,
            temperature: Some(0.7),
        }
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Final answer text
    pub output: String,
    /// Model calls made, including a forced final call
    pub llm_calls: usize,
    /// Whether the iteration cap forced the answer
    pub forced: bool,
    pub usage: TokenUsage,
}

/// LLM ↔ tool loop for a single agent
pub struct AgentExecutor {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    config: ExecutorConfig,
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
}

impl AgentExecutor {
    pub fn new(provider: Arc<dyn LLMProvider>, tools: ToolRegistry, config: ExecutorConfig) -> Self {
        Self {
            provider,
            tools,
            config,
            event_handler: None,
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Run after `history`, which is sent ahead of the new user message
    pub async fn run_with_history(
        &self,
        history: Vec<Message>,
        user_message: impl Into<String>,
    ) -> Result<ExecutionOutcome> {
        let mut conversation = history;
        conversation.push(Message::user(user_message));

        let mut usage = TokenUsage::default();
        let mut llm_calls = 0;

        for iteration in 1..=self.config.max_iterations {
            debug!(
                iteration,
                max_iterations = self.config.max_iterations,
                "executor iteration"
            );

            let response = self.call(&conversation, true).await?;
            llm_calls += 1;
            usage += response.usage;

            let message = response.message;
            if message.has_tool_uses() {
                let results = self.execute_tools(&message).await;
                conversation.push(message);
                conversation.push(Message::tool_results(results));
                continue;
            }

            if response.stop_reason == StopReason::MaxTokens {
                warn!(iteration, "answer truncated at the token limit");
            }

            let output = message.text().unwrap_or_default();
            if output.trim().is_empty() {
                // Nudge once more rather than accept an empty answer
                warn!(iteration, "empty answer from model");
                conversation.push(message);
                conversation.push(Message::user(
                    "Your last reply was empty. Reply with your complete final answer.",
                ));
                continue;
            }

            info!(iteration, tokens = usage.total(), "agent produced final answer");
            return Ok(ExecutionOutcome {
                output,
                llm_calls,
                forced: false,
                usage,
            });
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "iteration cap reached, forcing final answer"
        );
        conversation.push(Message::user(FORCE_FINAL_ANSWER));

        let response = self.call(&conversation, false).await?;
        llm_calls += 1;
        usage += response.usage;

        let output = response.message.text().unwrap_or_default();
        if output.trim().is_empty() {
            return Err(Error::ProcessingFailed(format!(
                "no final answer after {} iterations",
                self.config.max_iterations
            )));
        }

        Ok(ExecutionOutcome {
            output,
            llm_calls,
            forced: true,
            usage,
        })
    }

    async fn call(
        &self,
        conversation: &[Message],
        with_tools: bool,
    ) -> Result<crew_llm::CompletionResponse> {
        let mut builder = CompletionRequest::builder(&self.config.model)
            .messages(conversation.to_vec())
            .max_tokens(self.config.max_tokens);

        if let Some(system) = &self.config.system_prompt {
            builder = builder.system(system);
        }
        if let Some(temperature) = self.config.temperature {
            builder = builder.temperature(temperature);
        }
        if with_tools {
            builder = builder.tools(self.tools.definitions());
        }

        self.provider
            .complete(builder.build())
            .await
            .map_err(|e| Error::ProcessingFailed(format!("{} call failed: {e}", self.provider.name())))
    }

    /// Run every tool call in `message`
    ///
    /// Tool failures and unknown tool names are reported back to the model
    /// as error results; they never abort the loop.
    async fn execute_tools(&self, message: &Message) -> Vec<crew_llm::ContentBlock> {
        let mut results = Vec::new();

        for (id, name, input) in message.tool_uses() {
            if let Some(handler) = &self.event_handler {
                handler.on_tool_start(id, name, input).await;
            }

            let Some(tool) = self.tools.get(name) else {
                warn!(tool_name = %name, "model called an unknown tool");
                let error = format!(
                    "Error: tool '{name}' does not exist. Available tools: {}",
                    self.tools.names().join(", ")
                );
                if let Some(handler) = &self.event_handler {
                    handler.on_tool_done(id, name, Err(&error), 0).await;
                }
                results.push(Message::tool_error(id, error));
                continue;
            };

            let input_preview: String = input.to_string().chars().take(200).collect();
            info!(tool_name = %name, tool_id = %id, input = %input_preview, "executing tool");

            let start = Instant::now();
            let outcome = tool.execute(input.clone()).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(value) => {
                    let text = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    debug!(tool_name = %name, duration_ms, result_length = text.len(), "tool succeeded");
                    if let Some(handler) = &self.event_handler {
                        handler.on_tool_done(id, name, Ok(&text), duration_ms).await;
                    }
                    results.push(Message::tool_result(id, text));
                }
                Err(e) => {
                    let error = format!("Error: {e}");
                    warn!(tool_name = %name, duration_ms, error = %e, "tool failed");
                    if let Some(handler) = &self.event_handler {
                        handler.on_tool_done(id, name, Err(&error), duration_ms).await;
                    }
                    results.push(Message::tool_error(id, error));
                }
            }
        }

        results
    }
}
