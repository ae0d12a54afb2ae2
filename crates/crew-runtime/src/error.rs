//! Crew errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrewError>;

/// Errors from building or running a crew
#[derive(Debug, Error)]
pub enum CrewError {
    /// The agent/task configuration is inconsistent
    #[error("invalid crew: {0}")]
    InvalidCrew(String),

    /// An agent references a tool that is not registered
    #[error("agent '{agent}' references unregistered tool '{tool}'")]
    MissingTool { agent: String, tool: String },

    /// A prompt template failed to parse or render
    #[error("template '{name}' failed: {detail}")]
    Template { name: String, detail: String },

    /// A stage failed; the kickoff stops here
    #[error("task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: crew_core::Error,
    },
}
