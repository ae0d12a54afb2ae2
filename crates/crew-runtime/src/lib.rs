//! Sequential crew runtime
//!
//! A [`Crew`] is a fixed set of agents and an ordered list of tasks. Kickoff
//! runs the tasks one after another; each task is handled by its agent
//! through an [`AgentExecutor`], and the outputs of the tasks it declares as
//! context are written into its prompt.
//!
//! ```no_run
//! use crew_core::Inputs;
//! use crew_llm::{OpenAIConfig, OpenAIProvider};
//! use crew_runtime::{AgentSpec, Crew, TaskSpec};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let crew = Crew::builder()
//!     .provider(Arc::new(OpenAIProvider::with_config(OpenAIConfig::new("sk-..."))?))
//!     .agent(AgentSpec::new("Researcher", "Research {{ topic }}", "You dig deep."))
//!     .task(TaskSpec::new("research", "Research {{ topic }}", "Three bullet points", "Researcher"))
//!     .build()?;
//!
//! let output = crew
//!     .kickoff(&Inputs::new().with("topic", serde_json::json!("tokio")))
//!     .await?;
//! println!("{}", output.final_output);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod crew;
pub mod error;
pub mod executor;
pub mod task;
pub mod template;

pub use agent::AgentSpec;
pub use crew::{Crew, CrewBuilder, CrewEventHandler, CrewOutput, LoggingEventHandler};
pub use error::{CrewError, Result};
pub use executor::{AgentExecutor, ExecutionOutcome, ExecutorConfig, ExecutorEventHandler};
pub use task::{TaskOutput, TaskSpec};
