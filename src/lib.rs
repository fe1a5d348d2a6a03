//! # paperflow
//!
//! Research paper discovery pipeline: turns a natural-language research
//! request into a structured arXiv-style query, retrieves candidate papers
//! from several sources in parallel, ingests new ones into a managed
//! memory/search store and answers semantic searches against it.
//!
//! ## Modules
//!
//! - [`formulator`] - Request -> structured query via a completion service
//! - [`sources`] - arXiv and Google Scholar (SerpApi) adapters
//! - [`retriever`] - Concurrent fan-out over all sources
//! - [`ingest`] - Title-deduplicated upload into the store
//! - [`gateway`] - Store search normalization
//! - [`pipeline`] - The four stages wired together
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use paperflow::config::Config;
//! use paperflow::pipeline::{Pipeline, PipelineRequest};
//! use paperflow::formulator::QueryFormulator;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pipeline = Pipeline::new(
//!         QueryFormulator::new(Arc::new(config.build_completion_client()?)),
//!         config.build_retriever()?,
//!         Arc::new(config.build_store()?),
//!     );
//!     let report = pipeline
//!         .run(&PipelineRequest {
//!             query: "RAG question chunking".into(),
//!             max_results: 10,
//!             collection: config.collection.clone(),
//!             year_from: None,
//!             year_to: None,
//!         })
//!         .await?;
//!     println!("Ingested {} papers", report.ingested_count);
//!     Ok(())
//! }
//! ```

pub mod completion;
pub mod config;
pub mod error;
pub mod formulator;
pub mod gateway;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod query_grammar;
pub mod retriever;
pub mod server;
pub mod sources;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{PaperflowError, Result};
