//! Task records and their outputs

use crate::{Result, template};
use crew_core::Inputs;
use serde::{Deserialize, Serialize};

/// A unit of work bound to one agent
///
/// `description` and `expected_output` are templates. `context` names
/// earlier tasks whose raw output is written into this task's prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub description: String,
    pub expected_output: String,
    /// Role of the agent that runs the task
    pub agent: String,
    pub context: Vec<String>,
}

impl TaskSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent: agent.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, task: impl Into<String>) -> Self {
        self.context.push(task.into());
        self
    }

    /// User prompt for this task
    ///
    /// `context` holds the outputs of the tasks named in [`TaskSpec::context`],
    /// in declaration order.
    pub fn prompt(&self, inputs: &Inputs, context: &[&TaskOutput]) -> Result<String> {
        let description = template::render(
            &format!("{} description", self.name),
            &self.description,
            inputs,
        )?;
        let expected = template::render(
            &format!("{} expected_output", self.name),
            &self.expected_output,
            inputs,
        )?;

        let mut prompt = format!(
            "{description}\n\n\
             This is the expected criteria for your final answer: {expected}\n\
             You MUST return the actual complete content as the final answer, not a summary."
        );

        if !context.is_empty() {
            prompt.push_str("\n\nThis is the context you're working with:");
            for output in context {
                prompt.push_str(&format!(
                    "\n\n### Output of '{}' ({})\n{}",
                    output.task, output.agent, output.raw
                ));
            }
        }

        Ok(prompt)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        template::validate(&format!("{} description", self.name), &self.description)?;
        template::validate(
            &format!("{} expected_output", self.name),
            &self.expected_output,
        )
    }
}

/// Result of one finished task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    /// Rendered description the agent worked from
    pub description: String,
    /// The agent's final answer
    pub raw: String,
}
