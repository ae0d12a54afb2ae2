//! Agent records

use crate::{Result, template};
use crew_core::Inputs;
use serde::{Deserialize, Serialize};

/// Iteration cap used when an agent does not set one
pub const DEFAULT_MAX_ITER: usize = 15;

/// An agent: a persona plus the tools it may call
///
/// Agents are plain records. `goal` and `backstory` are templates rendered
/// with the kickoff inputs; `role` doubles as the agent's identifier and
/// is what tasks refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Tool-call rounds allowed per task before a final answer is forced
    pub max_iter: usize,
    /// Carry this agent's earlier answers into its later tasks
    pub memory: bool,
    /// Registered tool names this agent may call
    pub tools: Vec<String>,
    /// Recorded only; the sequential process never delegates
    pub allow_delegation: bool,
}

impl AgentSpec {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            max_iter: DEFAULT_MAX_ITER,
            memory: false,
            tools: Vec::new(),
            allow_delegation: false,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_memory(mut self, memory: bool) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_tool(mut self, name: impl Into<String>) -> Self {
        self.tools.push(name.into());
        self
    }

    pub fn with_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    /// System prompt for this agent, rendered with `inputs`
    pub fn system_prompt(&self, inputs: &Inputs) -> Result<String> {
        let role = &self.role;
        let goal = template::render(&format!("{} goal", self.role), &self.goal, inputs)?;
        let backstory =
            template::render(&format!("{} backstory", self.role), &self.backstory, inputs)?;

        Ok(format!(
            "You are {role}. {backstory}\nYour personal goal is: {goal}\n\
             Use the tools you are given when they help. When you have everything you need, \
             reply with your complete final answer and nothing else."
        ))
    }

    /// Check the templates parse
    pub(crate) fn validate(&self) -> Result<()> {
        template::validate(&format!("{} goal", self.role), &self.goal)?;
        template::validate(&format!("{} backstory", self.role), &self.backstory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let agent = AgentSpec::new("Analyst", "Analyze", "Experienced");
        assert_eq!(agent.max_iter, DEFAULT_MAX_ITER);
        assert!(!agent.memory);
        assert!(!agent.allow_delegation);
        assert!(agent.tools.is_empty());
    }

    #[test]
    fn test_builder_methods() {
        let agent = AgentSpec::new("Analyst", "Analyze", "Experienced")
            .with_max_iter(5)
            .with_memory(true)
            .with_tool("Yahoo Finance Tool")
            .with_delegation(true);
        assert_eq!(agent.max_iter, 5);
        assert!(agent.memory);
        assert!(agent.allow_delegation);
        assert_eq!(agent.tools, vec!["Yahoo Finance Tool"]);
    }

    #[test]
    fn test_system_prompt_renders_goal() {
        let agent = AgentSpec::new(
            "Senior stock price Analyst",
            "Find the {{ ticker }} stock price and analyses trends",
            "You're highly experienced.",
        );
        let prompt = agent
            .system_prompt(&Inputs::new().with_ticker("NVDA"))
            .unwrap();

        assert!(prompt.starts_with("You are Senior stock price Analyst. You're highly experienced."));
        assert!(prompt.contains("Your personal goal is: Find the NVDA stock price"));
    }

    #[test]
    fn test_system_prompt_requires_inputs() {
        let agent = AgentSpec::new("Analyst", "Find {{ ticker }}", "b");
        assert!(agent.system_prompt(&Inputs::new()).is_err());
    }
}
