// ABOUTME: StrideIQ HTTP server binary
// ABOUTME: Loads configuration, connects the database and serves the coaching API until Ctrl-C
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # StrideIQ Server Binary

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use strideiq_server::auth::AuthManager;
use strideiq_server::config::{DatabaseUrl, ServerConfig};
use strideiq_server::database::Database;
use strideiq_server::llm::{LlmProvider, OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use strideiq_server::logging;
use strideiq_server::server::{serve, ServerResources};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "strideiq-server")]
#[command(about = "StrideIQ - wearable data ingestion and AI training plans")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL (e.g. `sqlite:./data/strideiq.db` or `sqlite::memory:`)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url.as_deref() {
        config.database.url = DatabaseUrl::parse_url(database_url)?;
    }

    logging::init_from_env()?;
    info!("Starting StrideIQ server");
    info!("{}", config.summary());

    let database = if config.database.auto_migrate {
        Database::new(&config.database.url).await?
    } else {
        Database::connect(&config.database.url).await?
    };
    info!("Database ready: {}", config.database.url);

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
        OpenAiCompatibleConfig::from(&config.llm),
    )?);
    let auth_manager = AuthManager::new(
        config.auth.jwt_secret.as_bytes().to_vec(),
        config.auth.jwt_expiry_hours,
    );

    let resources = Arc::new(ServerResources::new(database, auth_manager, llm, config));
    if let Err(e) = serve(resources).await {
        error!("Server error: {e:#}");
        return Err(e);
    }
    Ok(())
}
