//! # herald
//!
//! SSE broadcast hub binary: loads settings, starts the HTTP server and
//! runs the hub shutdown when a termination signal arrives.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use herald_core::LogFormat;
use herald_core::logging::init_subscriber;
use herald_server::{HeraldServer, HubConfig, ServerConfig, wait_for_signal};
use herald_settings::HeraldSettings;

/// Herald SSE broadcast hub.
#[derive(Parser, Debug)]
#[command(name = "herald", about = "Server-sent events broadcast hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.herald/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: pretty, compact or json (overrides settings).
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

fn parse_log_format(raw: &str) -> std::result::Result<LogFormat, String> {
    match raw.to_ascii_lowercase().as_str() {
        "pretty" => Ok(LogFormat::Pretty),
        "compact" => Ok(LogFormat::Compact),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format: {other}")),
    }
}

/// Load settings, then apply command-line overrides on top.
fn resolve_settings(cli: &Cli) -> Result<HeraldSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(herald_settings::settings_path);
    let mut settings = herald_settings::load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;

    if let Some(host) = &cli.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    settings.validate().context("invalid command-line override")?;
    Ok(settings)
}

fn server_config(settings: &HeraldSettings) -> ServerConfig {
    ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
    }
}

fn hub_config(settings: &HeraldSettings) -> HubConfig {
    HubConfig {
        heartbeat_interval: settings.hub.heartbeat_interval(),
        write_timeout: settings.hub.write_timeout(),
        shutdown_grace: settings.hub.shutdown_grace(),
        send_queue_capacity: settings.hub.send_queue_capacity,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    let hub = hub_config(&settings);
    let grace = hub.shutdown_grace;
    let mut server = HeraldServer::new(server_config(&settings), hub);
    match herald_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(error) => tracing::warn!(%error, "metrics disabled"),
    }

    let (addr, handle) = server.listen().await.with_context(|| {
        format!(
            "failed to bind {}:{}",
            settings.server.host, settings.server.port
        )
    })?;
    tracing::info!("SSE server running on http://{addr}");

    let signal = wait_for_signal()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!(signal, "shutting down");

    let report = server.hub().on_shutdown().await;
    tracing::info!(
        subscribers = report.subscribers,
        notified = report.notified,
        timed_out = report.timed_out,
        "subscribers closed"
    );
    let stopped = server
        .shutdown()
        .graceful_shutdown(vec![handle], grace)
        .await;
    if !stopped {
        tracing::warn!("http server did not stop within the grace period");
    }

    tracing::info!("shutdown complete");
    Ok(())
}
