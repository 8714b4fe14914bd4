pub mod commands;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod policy;
pub mod service;
pub mod stats;

use crate::config::AppConfig;
use crate::db::Database;
use crate::errors::AppResult;
use crate::policy::PolicyEngine;
use crate::service::ComplaintService;
use anyhow::Context;
use serde::Deserialize;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ComplaintService>,
    pub database: Arc<Database>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let database = Arc::new(Database::with_key(&config.database_path(), &config.storage_key)?);
        let policy = PolicyEngine::new(config.transition_policy, config.enforce_capabilities);
        Ok(Self {
            service: Arc::new(ComplaintService::new(database.clone(), policy)),
            database,
        })
    }

    pub fn in_memory() -> AppResult<Self> {
        let config = AppConfig::default();
        let database = Arc::new(Database::open_in_memory()?);
        let policy = PolicyEngine::new(config.transition_policy, config.enforce_capabilities);
        Ok(Self {
            service: Arc::new(ComplaintService::new(database.clone(), policy)),
            database,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BridgeRequest {
    command: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Serves newline-delimited `{"command", "args"}` requests from stdin until EOF.
pub fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
    init_tracing(&config.data_dir, &config.log_filter).map_err(anyhow::Error::msg)?;

    let state = AppState::from_config(&config).context("failed to open complaint store")?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        storage_key = %config.storage_key,
        "complaint bridge started"
    );

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&state, &line);
        writeln!(stdout, "{}", reply).context("failed to write reply")?;
        stdout.flush().context("failed to flush reply")?;
    }

    tracing::info!("complaint bridge stopped");
    Ok(())
}

pub fn handle_line(state: &AppState, line: &str) -> serde_json::Value {
    let request: BridgeRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(error) => return serde_json::json!({ "error": format!("VALIDATION: malformed request: {}", error) }),
    };
    match commands::invoke(state, &request.command, request.args) {
        Ok(value) => serde_json::json!({ "ok": value }),
        Err(error) => serde_json::json!({ "error": error }),
    }
}

fn init_tracing(data_dir: &Path, default_filter: &str) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "civic.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
