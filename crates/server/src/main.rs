mod bootstrap;
mod callback;
mod health;
mod pipeline;

use std::future::IntoFuture;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sudsy_core::config::{AppConfig, ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "sudsy-server",
    version,
    about = "Webhook responder answering laundry status and billing queries"
)]
struct Args {
    /// Path to a sudsy.toml config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Listen port for the webhook endpoint
    #[arg(long)]
    port: Option<u16>,
    /// Bind address for the webhook and health endpoints
    #[arg(long)]
    bind_address: Option<String>,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(config: &AppConfig) {
    use sudsy_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let args = Args::parse();

    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions {
        config_path: args.config,
        require_file: false,
        overrides: ConfigOverrides {
            port: args.port,
            bind_address: args.bind_address,
            log_level: args.log_level,
            ..ConfigOverrides::default()
        },
    })?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.store.clone(),
    )
    .await?;

    let router = callback::router(app.channel_secret.clone(), app.pipeline.clone());
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "webhook endpoint listening"
    );

    let drain_window = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let graceful = axum::serve(listener, router).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    let serve_handle = tokio::spawn(graceful.into_future());

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "shutdown signal received; draining in-flight requests"
    );

    match tokio::time::timeout(drain_window, serve_handle).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                "graceful drain window elapsed; exiting"
            );
        }
    }

    Ok(())
}
