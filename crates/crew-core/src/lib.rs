//! Core types shared across the stock-crew workspace
//!
//! This crate defines the error type used by tools and agents, and the
//! [`Inputs`] map that parameterises a crew kickoff.

pub mod error;
pub mod inputs;

pub use error::{Error, Result};
pub use inputs::Inputs;
