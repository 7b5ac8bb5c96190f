//! timtam-orchestrator - Grasp orchestrator worker
//!
//! Runs the ingestion loop and queue ticker over in-process queues and serves
//! a small HTTP surface for feeding them and inspecting the engine.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use timtam_core::config::{ConfigResolver, SqliteConfigStore, parse_grasp_group};
use timtam_core::ingest::{IngestLoop, spawn_ticker};
use timtam_core::meeting::OrchestratorManager;
use timtam_core::telemetry::init_tracing;
use tokio::sync::watch;
use tracing::{error, info};

mod adapters;
mod cli;
mod config;
mod routes;
mod state;

use adapters::{HttpJudgeClient, MetricsRegistry, TracingNotifier};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load(cli.config.as_deref())?;
    init_tracing(cli.json_logs || config.logging.json, config.log_level());

    match cli.command.unwrap_or(Commands::Serve { listen: None }) {
        Commands::Serve { listen } => serve(config, listen).await,
        Commands::Validate { file } => validate(&file),
    }
}

async fn serve(mut config: config::Config, listen: Option<String>) -> Result<()> {
    if let Some(addr) = listen {
        config.server.listen_addr = addr;
    }
    info!("timtam-orchestrator v{}", env!("CARGO_PKG_VERSION"));

    let metrics = Arc::new(MetricsRegistry::new());
    let store = Arc::new(
        SqliteConfigStore::open_path(&config.storage.database_path).with_context(|| {
            format!(
                "opening config store {}",
                config.storage.database_path.display()
            )
        })?,
    );

    let judge = Arc::new(HttpJudgeClient::new(config.judge.clone(), metrics.clone())?);
    let manager = Arc::new(OrchestratorManager::new(
        config.engine.clone(),
        ConfigResolver::new(store.clone()),
        judge,
        Arc::new(TracingNotifier),
        metrics.clone(),
    ));
    let state = Arc::new(AppState::new(manager.clone(), store, metrics.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest = IngestLoop::new(
        manager.clone(),
        state.transcripts.clone(),
        config.ingest.clone(),
    )
    .with_control(state.control.clone());
    let ingest_task = tokio::spawn(ingest.run(shutdown_rx.clone()));
    let ticker_task = spawn_ticker(manager.clone(), config.engine.tick_interval(), shutdown_rx);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "server.listening");

    axum::serve(listener, routes::create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "signal.listen_failed");
            }
            info!("Shutting down...");
        })
        .await?;

    shutdown_tx.send(true).ok();
    for (name, task) in [("ingest", ingest_task), ("ticker", ticker_task)] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "task.join_failed");
        }
    }
    manager.cleanup().await;
    metrics.flush();
    Ok(())
}

fn validate(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let definition = parse_grasp_group(&text)
        .with_context(|| format!("{} is not a valid Grasp group", file.display()))?;

    println!("{}: {} grasps", file.display(), definition.len());
    for grasp in routes::configs::summarize(&definition) {
        match grasp.note_tag {
            Some(tag) => println!(
                "  {:<24} every {:>6}s  -> {} [{}]",
                grasp.node_id, grasp.interval_sec, grasp.output_handler, tag
            ),
            None => println!(
                "  {:<24} every {:>6}s  -> {}",
                grasp.node_id, grasp.interval_sec, grasp.output_handler
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_builtin_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grasps.toml");
        std::fs::write(&path, timtam_core::config::BUILTIN_GRASP_TOML).unwrap();
        validate(&path).unwrap();
    }

    #[test]
    fn test_validate_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grasps.toml");
        std::fs::write(&path, "grasps = [1]").unwrap();

        let err = validate(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("grasps[0]: must be a table"));
        assert!(validate(&dir.path().join("missing.toml")).is_err());
    }
}
