//! Tools that crew agents can call
//!
//! A [`Tool`] is an async function with a name, a description and a JSON
//! Schema for its input. The [`ToolRegistry`] holds every tool a crew knows
//! about and hands each agent the subset it was configured with.

pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::Tool;
