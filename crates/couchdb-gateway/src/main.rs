//! couchdb-mcp
//!
//! Serves the read-only CouchDB tools as an MCP server on stdin/stdout.
//! Logs go to stderr; stdout belongs to the protocol.

use std::sync::Arc;

use rmcp::ServiceExt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use couchdb_gateway::{CouchConfig, CouchDbMcpServer, HttpDbClient, ToolGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let config = CouchConfig::from_env()?;
    let client = HttpDbClient::new(&config)?;
    let gateway = ToolGateway::from_config(Arc::new(client), &config);

    tracing::info!(
        url = %config.base_url,
        authenticated = config.credentials.is_some(),
        max_limit = config.max_limit,
        "couchdb-mcp serving on stdio"
    );

    let service = CouchDbMcpServer::new(Arc::new(gateway))
        .serve(rmcp::transport::stdio())
        .await?;
    service.waiting().await?;

    tracing::info!("couchdb-mcp stopped");
    Ok(())
}
