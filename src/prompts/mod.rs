//! Prompt module for LLM-based operations.

pub mod query_formulation;

pub use query_formulation::*;
