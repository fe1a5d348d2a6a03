//! HTTP surface.
//!
//! `POST /search` drives the whole pipeline and always answers with a JSON
//! body: `status: "success"` with the report, or `status: "error"` with a
//! message. Pipeline errors never become HTTP errors.

use crate::config::DEFAULT_COLLECTION;
use crate::models::SearchResult;
use crate::pipeline::{Pipeline, PipelineRequest};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_MAX_RESULTS: usize = 10;

/// Shared server state
pub struct AppState {
    /// `Err` holds the reason the pipeline could not be built
    pipeline: std::result::Result<Pipeline, String>,
    collection: String,
}

impl AppState {
    pub fn new(pipeline: Pipeline, collection: &str) -> Self {
        Self {
            pipeline: Ok(pipeline),
            collection: collection.to_string(),
        }
    }

    /// State for a server whose pipeline is misconfigured; every search
    /// answers with the configuration error.
    pub fn unconfigured(reason: String) -> Self {
        Self {
            pipeline: Err(reason),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .route("/favorites", get(favorites_handler))
        .route("/graph", get(graph_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn favorites_handler() -> Json<Value> {
    Json(json!({"message": "Favorites"}))
}

async fn graph_handler() -> Json<Value> {
    Json(json!({"message": "Graph"}))
}

/// Search request body
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// Search response
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SearchResponse {
    Success {
        query: String,
        formulated_query: String,
        scraped_count: usize,
        ingested_count: usize,
        search_results: SearchResult,
        message: String,
    },
    Error {
        message: String,
        query: String,
    },
}

async fn search_handler(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Json<SearchResponse> {
    info!(query = %req.query, max_results = req.max_results, "Search request");

    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Json(SearchResponse::Error {
            message: "Query must not be empty".to_string(),
            query,
        });
    }

    let pipeline = match &state.pipeline {
        Ok(pipeline) => pipeline,
        Err(reason) => {
            error!(reason = %reason, "Pipeline not configured");
            return Json(SearchResponse::Error {
                message: reason.clone(),
                query,
            });
        }
    };

    let request = PipelineRequest {
        query: query.clone(),
        max_results: req.max_results,
        collection: req.collection.unwrap_or_else(|| state.collection.clone()),
        year_from: req.year_from,
        year_to: req.year_to,
    };

    match pipeline.run(&request).await {
        Ok(report) => Json(SearchResponse::Success {
            message: format!(
                "Scraped {} papers, ingested {} new, found {} results",
                report.scraped_count, report.ingested_count, report.search_results.count
            ),
            query: report.query,
            formulated_query: report.formulated_query,
            scraped_count: report.scraped_count,
            ingested_count: report.ingested_count,
            search_results: report.search_results,
        }),
        Err(e) => {
            error!(query = %query, error = %e, "Pipeline failed");
            Json(SearchResponse::Error {
                message: e.to_string(),
                query,
            })
        }
    }
}
