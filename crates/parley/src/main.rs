//! # parley
//!
//! Parley server binary: loads settings, starts logging and metrics, and
//! serves the broadcast hub until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parley_logging::LogFormat;
use parley_server::{ParleyServer, ServerConfig};
use parley_settings::ParleySettings;

/// Parley broadcast hub server.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Real-time broadcast hub")]
struct Cli {
    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long, short)]
    port: Option<u16>,

    /// Directory served for non-WebSocket requests.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Heartbeat interval in milliseconds.
    #[arg(long)]
    heartbeat_ms: Option<u64>,

    /// Log filter directive (`RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Layer CLI flags over loaded settings.
    fn apply(&self, settings: &mut ParleySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir = dir.display().to_string();
        }
        if let Some(ms) = self.heartbeat_ms {
            settings.server.heartbeat_interval_ms = ms;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    LogFormat::parse(value).ok_or_else(|| format!("unknown log format `{value}`"))
}

fn load_settings(cli: &Cli) -> Result<ParleySettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(parley_settings::settings_path);
    let mut settings = parley_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    parley_logging::init_from_settings(&settings.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting parley");

    let metrics = match parley_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            None
        }
    };

    let server = ParleyServer::new(ServerConfig::from(&settings.server), metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        %addr,
        static_dir = %server.config().static_dir.display(),
        heartbeat_ms = settings.server.heartbeat_interval_ms,
        "parley ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().track(handle);
    server
        .shutdown()
        .graceful_shutdown(Some(Duration::from_secs(5)))
        .await;
    tracing::info!("shutdown complete");
    Ok(())
}
