//! supportops
//!
//! One investigation per invocation: acquire the providers, let the agent
//! work under a turn cap, release everything and print the report.
//! Logs go to stderr; stdout carries only the answer.

mod cli;
mod render;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::AgentBuilder;
use agent_runtime::RuntimeConfig;
use session_orchestrator::{
    CatalogOptions, CredentialStore, SUPPORTOPS_PROMPT, SessionConfig, SessionOrchestrator,
    catalog, preflight, standard_specs,
};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "supportops failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let goal = cli.goal_text();
    if goal.trim().is_empty() {
        bail!("describe the customer and the problem to investigate");
    }

    // Providers and their credentials, checked before anything is launched
    let options = CatalogOptions::from_env().in_process_couchdb(cli.couchdb_in_process);
    let specs = catalog::select(standard_specs(&options)?, &cli.only)?;
    let credentials = CredentialStore::from_env_for(&specs);
    preflight(&credentials, &specs)?;

    // Model backend
    let backend = RuntimeConfig::from_env()?.build()?;
    match backend.provider.health_check().await {
        Ok(true) => tracing::info!(backend = backend.provider.name(), model = %backend.model, "model backend reachable"),
        Ok(false) | Err(_) => {
            tracing::warn!(backend = backend.provider.name(), "model backend health check failed; continuing");
        }
    }

    let agent = AgentBuilder::new()
        .provider(backend.provider.clone())
        .model(backend.model.clone())
        .system_prompt(SUPPORTOPS_PROMPT)
        .build()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; closing providers");
                cancel.cancel();
            }
        }
    });

    let config = SessionConfig {
        max_turns: cli.max_turns,
        connect_timeout: Duration::from_secs(cli.connect_timeout_secs),
    };
    let mut session = SessionOrchestrator::new(config, credentials).with_cancellation(cancel);
    tracing::info!(session = %session.id(), providers = specs.len(), "starting investigation");

    let outcome = session.execute(&specs, &agent, &goal).await?;

    if cli.json {
        println!("{}", render::json(&outcome));
    } else {
        print!("{}", render::human(&outcome));
    }

    Ok(if outcome.answered() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
