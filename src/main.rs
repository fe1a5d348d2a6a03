//! paperflow - Research paper discovery pipeline
//!
//! Formulates a structured query from a natural-language request, retrieves
//! papers from arXiv and Google Scholar in parallel, ingests new ones into
//! the memory store and searches it.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! paperflow run "RAG question chunking" --max-results 10
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! paperflow serve --port 3000
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperflow::config::Config;
use paperflow::formulator::QueryFormulator;
use paperflow::gateway::SearchGateway;
use paperflow::pipeline::{Pipeline, PipelineRequest};
use paperflow::server::{create_router, AppState};
use paperflow::store::{document_status, list_documents, MemoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Research paper discovery pipeline
#[derive(Parser)]
#[command(name = "paperflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a research request into a structured query
    Formulate {
        /// Natural-language research request
        request: String,
    },

    /// Run the full pipeline: formulate, retrieve, ingest, search
    Run {
        /// Natural-language research request
        request: String,

        /// Results per source (also the search limit)
        #[arg(long, default_value = "10")]
        max_results: usize,

        /// Store collection (default: PAPERFLOW_COLLECTION or arxiv-papers)
        #[arg(long)]
        collection: Option<String>,

        /// Results from this year onwards
        #[arg(long)]
        year_from: Option<i32>,

        /// Results up to this year
        #[arg(long)]
        year_to: Option<i32>,
    },

    /// Semantic search over ingested papers
    Search {
        query: String,

        #[arg(long, default_value = "10")]
        limit: usize,

        /// Restrict to one collection
        #[arg(long)]
        collection: Option<String>,
    },

    /// List recently ingested documents
    Documents {
        #[arg(long)]
        collection: Option<String>,

        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show processing status of a document
    Status {
        /// Document id
        id: String,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    let config = Config::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Formulate { request } => run_formulate(&config, &request).await,
        Commands::Run {
            request,
            max_results,
            collection,
            year_from,
            year_to,
        } => {
            let request = PipelineRequest {
                query: request,
                max_results,
                collection: collection.unwrap_or_else(|| config.collection.clone()),
                year_from,
                year_to,
            };
            run_pipeline(&config, &request).await
        }
        Commands::Search {
            query,
            limit,
            collection,
        } => run_search(&config, &query, limit, collection).await,
        Commands::Documents { collection, limit } => {
            let store = config.build_store().context("Store not configured")?;
            let collection = collection.unwrap_or_else(|| config.collection.clone());
            let docs = list_documents(&store, &collection, limit).await?;
            print_json(&docs)
        }
        Commands::Status { id } => {
            let store = config.build_store().context("Store not configured")?;
            let status = document_status(&store, &id).await?;
            print_json(&status)
        }
        Commands::Serve { port, host } => run_server(config, host, port).await,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let completion = config
        .build_completion_client()
        .context("Completion service not configured")?;
    let store: Arc<dyn MemoryStore> = Arc::new(config.build_store().context("Store not configured")?);
    let retriever = config.build_retriever().context("No usable sources")?;

    Ok(Pipeline::new(QueryFormulator::new(Arc::new(completion)), retriever, store))
}

// ============================================================================
// Commands
// ============================================================================

async fn run_formulate(config: &Config, request: &str) -> Result<()> {
    let completion = config
        .build_completion_client()
        .context("Completion service not configured")?;
    let query = QueryFormulator::new(Arc::new(completion)).formulate(request).await?;
    println!("{}", query);
    Ok(())
}

async fn run_pipeline(config: &Config, request: &PipelineRequest) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let report = pipeline.run(request).await?;

    for (source, reason) in &report.source_failures {
        warn!(source = %source, reason = %reason, "Source failed during run");
    }
    println!("Formulated query: {}", report.formulated_query);
    println!(
        "Scraped {} | ingested {} | skipped {}",
        report.scraped_count, report.ingested_count, report.skipped_count
    );
    print_json(&report.search_results)
}

async fn run_search(config: &Config, query: &str, limit: usize, collection: Option<String>) -> Result<()> {
    let store = Arc::new(config.build_store().context("Store not configured")?);
    let mut gateway = SearchGateway::new(store);
    if let Some(collection) = collection {
        gateway = gateway.with_collection(&collection);
    }
    let result = gateway.search(query, limit).await?;
    print_json(&result)
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(config: Config, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app_state = match build_pipeline(&config) {
        Ok(pipeline) => AppState::new(pipeline, &config.collection),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Pipeline unavailable, /search will report the error");
            AppState::unconfigured(format!("{:#}", e))
        }
    };

    let app = create_router(Arc::new(app_state));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
