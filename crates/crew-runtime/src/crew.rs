//! Crew assembly and the sequential kickoff

use crate::executor::{AgentExecutor, ExecutorConfig, ExecutorEventHandler};
use crate::{AgentSpec, CrewError, Result, TaskOutput, TaskSpec};
use async_trait::async_trait;
use crew_core::Inputs;
use crew_llm::{LLMProvider, Message, TokenUsage};
use crew_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

/// Result of a full kickoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Raw output of the last task
    pub final_output: String,
    /// Every task's output, in execution order
    pub tasks_output: Vec<TaskOutput>,
    pub token_usage: TokenUsage,
    /// Successful model calls across all tasks
    pub llm_calls: usize,
}

/// Task-level progress callbacks
#[async_trait]
pub trait CrewEventHandler: Send + Sync {
    async fn on_task_start(&self, _task: &str, _agent: &str) {}

    async fn on_task_complete(&self, _output: &TaskOutput) {}

    async fn on_task_failed(&self, _task: &str, _error: &str) {}

    async fn on_tool_call(&self, _task: &str, _tool: &str, _ok: bool) {}
}

/// Writes crew progress to the tracing log
pub struct LoggingEventHandler;

#[async_trait]
impl CrewEventHandler for LoggingEventHandler {
    async fn on_task_start(&self, task: &str, agent: &str) {
        info!(task, agent, "task started");
    }

    async fn on_task_complete(&self, output: &TaskOutput) {
        let preview: String = output.raw.chars().take(120).collect();
        info!(task = %output.task, agent = %output.agent, preview = %preview, "task complete");
    }

    async fn on_task_failed(&self, task: &str, error: &str) {
        warn!(task, error, "task failed");
    }

    async fn on_tool_call(&self, task: &str, tool: &str, ok: bool) {
        info!(task, tool, ok, "tool used");
    }
}

/// Forwards executor tool events to the crew handler, tagged with the task
struct TaskToolEvents {
    task: String,
    handler: Arc<dyn CrewEventHandler>,
}

#[async_trait]
impl ExecutorEventHandler for TaskToolEvents {
    async fn on_tool_done(
        &self,
        _id: &str,
        name: &str,
        result: std::result::Result<&str, &str>,
        _duration_ms: u64,
    ) {
        self.handler
            .on_tool_call(&self.task, name, result.is_ok())
            .await;
    }
}

/// A validated set of agents and tasks bound to a model
pub struct Crew {
    agents: Vec<AgentSpec>,
    tasks: Vec<TaskSpec>,
    tools: ToolRegistry,
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_iter: Option<usize>,
    max_tokens: usize,
    temperature: Option<f32>,
    event_handler: Option<Arc<dyn CrewEventHandler>>,
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("agents", &self.agents.iter().map(|a| &a.role).collect::<Vec<_>>())
            .field("tasks", &self.tasks.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("tools", &self.tools)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("max_iter", &self.max_iter)
            .finish_non_exhaustive()
    }
}

impl Crew {
    pub fn builder() -> CrewBuilder {
        CrewBuilder::default()
    }

    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn agent(&self, role: &str) -> Result<&AgentSpec> {
        self.agents
            .iter()
            .find(|a| a.role == role)
            .ok_or_else(|| CrewError::InvalidCrew(format!("unknown agent '{role}'")))
    }

    /// Iteration cap for one agent's task
    ///
    /// The crew-wide `max_iter`, when set, caps every agent.
    fn iteration_cap(&self, agent: &AgentSpec) -> usize {
        self.max_iter
            .map_or(agent.max_iter, |crew_max| agent.max_iter.min(crew_max))
            .max(1)
    }

    /// Run every task in order and return the collected outputs
    ///
    /// A task starts only after every earlier task has finished, so the
    /// outputs named in its context are always available. The first failing
    /// task ends the kickoff.
    pub async fn kickoff(&self, inputs: &Inputs) -> Result<CrewOutput> {
        let span = info_span!("crew_kickoff", ticker = inputs.ticker().unwrap_or_default());
        self.run_pipeline(inputs).instrument(span).await
    }

    async fn run_pipeline(&self, inputs: &Inputs) -> Result<CrewOutput> {
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());
        let mut memories: HashMap<&str, Vec<Message>> = HashMap::new();
        let mut usage = TokenUsage::default();
        let mut llm_calls = 0;

        for task in &self.tasks {
            let agent = self.agent(&task.agent)?;

            if let Some(handler) = &self.event_handler {
                handler.on_task_start(&task.name, &agent.role).await;
            }

            let result = self
                .run_task(task, agent, inputs, &outputs, memories.get(agent.role.as_str()))
                .instrument(info_span!("task", task = %task.name, agent = %agent.role))
                .await;

            let (prompt, outcome) = match result {
                Ok(done) => done,
                Err(err) => {
                    if let Some(handler) = &self.event_handler {
                        handler.on_task_failed(&task.name, &err.to_string()).await;
                    }
                    return Err(err);
                }
            };

            usage += outcome.usage;
            llm_calls += outcome.llm_calls;

            if agent.memory {
                let history = memories.entry(agent.role.as_str()).or_default();
                history.push(Message::user(prompt));
                history.push(Message::assistant(outcome.output.clone()));
            }

            let output = TaskOutput {
                task: task.name.clone(),
                agent: agent.role.clone(),
                description: crate::template::render(&task.name, &task.description, inputs)?,
                raw: outcome.output,
            };

            if let Some(handler) = &self.event_handler {
                handler.on_task_complete(&output).await;
            }
            outputs.push(output);
        }

        let final_output = outputs.last().map(|o| o.raw.clone()).unwrap_or_default();

        info!(
            tasks = outputs.len(),
            llm_calls,
            total_tokens = usage.total(),
            "crew finished"
        );

        Ok(CrewOutput {
            final_output,
            tasks_output: outputs,
            token_usage: usage,
            llm_calls,
        })
    }

    /// Build the prompt and run one task; returns the prompt with the outcome
    async fn run_task(
        &self,
        task: &TaskSpec,
        agent: &AgentSpec,
        inputs: &Inputs,
        finished: &[TaskOutput],
        memory: Option<&Vec<Message>>,
    ) -> Result<(String, crate::ExecutionOutcome)> {
        let context: Vec<&TaskOutput> = task
            .context
            .iter()
            .filter_map(|name| finished.iter().find(|o| &o.task == name))
            .collect();

        let prompt = task.prompt(inputs, &context)?;
        let system_prompt = agent.system_prompt(inputs)?;

        if agent.allow_delegation {
            debug!(agent = %agent.role, "delegation requested but the sequential process runs tasks in place");
        }

        let tools = self.tools.subset(&agent.tools).map_err(|tool| CrewError::MissingTool {
            agent: agent.role.clone(),
            tool,
        })?;

        let config = ExecutorConfig {
            max_iterations: self.iteration_cap(agent),
            model: self.model.clone(),
            system_prompt: Some(system_prompt),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut executor = AgentExecutor::new(Arc::clone(&self.provider), tools, config);
        if let Some(handler) = &self.event_handler {
            executor = executor.with_event_handler(Arc::new(TaskToolEvents {
                task: task.name.clone(),
                handler: Arc::clone(handler),
            }));
        }

        let history = memory.cloned().unwrap_or_default();
        let outcome = executor
            .run_with_history(history, prompt.clone())
            .await
            .map_err(|source| CrewError::TaskFailed {
                task: task.name.clone(),
                source,
            })?;

        if outcome.forced {
            warn!(task = %task.name, "answer forced at the iteration cap");
        }

        Ok((prompt, outcome))
    }
}

/// Builder for [`Crew`]; `build` checks the whole configuration
pub struct CrewBuilder {
    agents: Vec<AgentSpec>,
    tasks: Vec<TaskSpec>,
    tools: ToolRegistry,
    provider: Option<Arc<dyn LLMProvider>>,
    model: String,
    max_iter: Option<usize>,
    max_tokens: usize,
    temperature: Option<f32>,
    event_handler: Option<Arc<dyn CrewEventHandler>>,
}

impl Default for CrewBuilder {
    fn default() -> Self {
        let defaults = ExecutorConfig::default();
        Self {
            agents: Vec::new(),
            tasks: Vec::new(),
            tools: ToolRegistry::new(),
            provider: None,
            model: defaults.model,
            max_iter: None,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            event_handler: None,
        }
    }
}

impl CrewBuilder {
    pub fn agent(mut self, agent: AgentSpec) -> Self {
        self.agents.push(agent);
        self
    }

    /// Add a task; tasks run in the order they are added
    pub fn task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Crew-wide iteration cap applied on top of each agent's own
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn CrewEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Crew> {
        let provider = self
            .provider
            .ok_or_else(|| CrewError::InvalidCrew("no LLM provider configured".to_string()))?;

        if self.tasks.is_empty() {
            return Err(CrewError::InvalidCrew("a crew needs at least one task".to_string()));
        }

        let mut roles = HashSet::new();
        for agent in &self.agents {
            if !roles.insert(agent.role.as_str()) {
                return Err(CrewError::InvalidCrew(format!(
                    "duplicate agent role '{}'",
                    agent.role
                )));
            }
            for tool in &agent.tools {
                if !self.tools.contains(tool) {
                    return Err(CrewError::MissingTool {
                        agent: agent.role.clone(),
                        tool: tool.clone(),
                    });
                }
            }
            agent.validate()?;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for task in &self.tasks {
            if seen.contains(task.name.as_str()) {
                return Err(CrewError::InvalidCrew(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
            if !roles.contains(task.agent.as_str()) {
                return Err(CrewError::InvalidCrew(format!(
                    "task '{}' is assigned to unknown agent '{}'",
                    task.name, task.agent
                )));
            }
            for dep in &task.context {
                if dep == &task.name {
                    return Err(CrewError::InvalidCrew(format!(
                        "task '{}' lists itself as context",
                        task.name
                    )));
                }
                if !seen.contains(dep.as_str()) {
                    let reason = if self.tasks.iter().any(|t| &t.name == dep) {
                        "which runs after it"
                    } else {
                        "which does not exist"
                    };
                    return Err(CrewError::InvalidCrew(format!(
                        "task '{}' uses '{dep}' as context, {reason}",
                        task.name
                    )));
                }
            }
            task.validate()?;
            seen.insert(task.name.as_str());
        }

        Ok(Crew {
            agents: self.agents,
            tasks: self.tasks,
            tools: self.tools,
            provider,
            model: self.model,
            max_iter: self.max_iter,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            event_handler: self.event_handler,
        })
    }
}
