mod bootstrap;
mod health;
mod jobs;
mod report_render;
mod routes;
mod service;

use std::time::Duration;

use anyhow::Result;
use trainhub_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use trainhub_core::config::LogFormat::*;

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
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let renderer = report_render::ReportRenderer::with_embedded_templates()?;
    let state = routes::AppState::from_application(&app, renderer);
    let router = routes::router(state).merge(health::router(app.db_pool.clone()));

    let digest_job = std::sync::Arc::new(jobs::DigestJob::new(
        app.certificates.clone(),
        app.requests.clone(),
        app.users.clone(),
        app.notifications.clone(),
    ));
    let digest_handle = digest_job.spawn(Duration::from_secs(24 * 60 * 60));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "trainhub-server listening"
    );

    let shutdown_grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "trainhub-server stopping"
    );
    digest_handle.abort();
    tokio::time::timeout(shutdown_grace, app.db_pool.close()).await.ok();

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
