// ABOUTME: Shared server resources, router assembly and the HTTP serve loop
// ABOUTME: Wires database, auth, language model, coaching service, agent and ingestion into one axum app
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Server
//!
//! [`ServerResources`] is built once at startup and shared by every router
//! through an `Arc`. [`build_router`] merges the per-area routers and applies
//! the tracing and CORS layers; [`serve`] binds and runs until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::HeaderMap;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::AgentRuntime;
use crate::auth::{authenticate, AuthManager, AuthResult};
use crate::coaching::{CoachingService, ProgressService};
use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::AppResult;
use crate::ingestion::HealthIngestionService;
use crate::llm::LlmProvider;
use crate::middleware::{log_requests, make_request_span, setup_cors};
use crate::routes::{
    CoachingChatRoutes, HealthRoutes, HealthSyncRoutes, ProgressRoutes, RecommendationRoutes,
};

/// Centralized resource container shared by every handler
#[derive(Clone)]
pub struct ServerResources {
    /// Database handle
    pub database: Database,
    /// Bearer token validation
    pub auth_manager: Arc<AuthManager>,
    /// Language model used for plans and chat
    pub llm: Arc<dyn LlmProvider>,
    /// Recommendation pipeline
    pub coaching: CoachingService,
    /// Progress dashboard
    pub progress: ProgressService,
    /// Conversational agent
    pub agent: AgentRuntime,
    /// Wearable data ingestion
    pub ingestion: HealthIngestionService,
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
}

impl ServerResources {
    /// Build every service over the shared database and model
    #[must_use]
    pub fn new(
        database: Database,
        auth_manager: AuthManager,
        llm: Arc<dyn LlmProvider>,
        config: ServerConfig,
    ) -> Self {
        let model = config.llm.model.clone();
        Self {
            coaching: CoachingService::new(database.clone(), Arc::clone(&llm), model.clone()),
            agent: AgentRuntime::new(database.clone(), Arc::clone(&llm), model),
            ingestion: HealthIngestionService::new(database.clone()),
            progress: ProgressService::new(database.clone()),
            auth_manager: Arc::new(auth_manager),
            database,
            llm,
            config: Arc::new(config),
        }
    }

    /// Resolve the caller from the `Authorization` header
    ///
    /// # Errors
    ///
    /// Returns `AUTH_REQUIRED` or `AUTH_INVALID`
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthResult> {
        authenticate(headers, &self.auth_manager)
    }
}

/// Every route with tracing and CORS applied
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config.cors);

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(RecommendationRoutes::routes(Arc::clone(&resources)))
        .merge(CoachingChatRoutes::routes(Arc::clone(&resources)))
        .merge(ProgressRoutes::routes(Arc::clone(&resources)))
        .merge(HealthSyncRoutes::routes(resources))
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(cors)
}

/// Bind the configured address and serve until Ctrl-C
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails
pub async fn serve(resources: Arc<ServerResources>) -> Result<()> {
    let address = format!("{}:{}", resources.config.host, resources.config.http_port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("HTTP server listening on http://{address}");

    axum::serve(listener, build_router(resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
    }
}
