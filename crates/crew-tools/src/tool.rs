//! Tool trait definition

use async_trait::async_trait;
use crew_core::Result;
use crew_llm::ToolDefinition;
use serde_json::Value;

/// A function the model can call
///
/// Errors returned from [`Tool::execute`] are not fatal to a task: the
/// executor passes the message back to the model as a failed tool result.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool; `params` should match [`Tool::input_schema`]
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Name the model calls the tool by, unique within a registry
    fn name(&self) -> &str;

    /// Tells the model when the tool is useful
    fn description(&self) -> &str;

    /// JSON Schema of the input object
    fn input_schema(&self) -> Value;

    /// Definition advertised in completion requests
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}
