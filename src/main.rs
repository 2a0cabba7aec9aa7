mod api;
mod aws;
mod error;
mod recon;
mod utils;


use anyhow::anyhow;
use axum::{middleware, routing::get, Router};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::aws::{AwsClients, S3Location};
use crate::recon::Reconciler;
use crate::utils::{Config, ConfigArgs, LogFormat, Metrics};

#[derive(Parser)]
#[command(name = "sfmc-recon", version, about = "SFMC row-count reconciliation against Athena")]
struct Cli {
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile one landing file and exit
    Run(ConfigArgs),
    /// Serve the reconciliation API
    Serve(ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    utils::init_logging(cli.log_format);

    match cli.command {
        Command::Run(args) => run_once(args).await,
        Command::Serve(args) => serve(args).await,
    }
}

async fn run_once(args: ConfigArgs) -> anyhow::Result<()> {
    let config = Config::load(&args)?;

    let landing = config
        .landing_s3_uri
        .as_deref()
        .ok_or_else(|| anyhow!("--landing-s3-uri (or RECON_LANDING_S3_URI) is required"))?;
    let landing = S3Location::parse(landing)?;

    let metrics = Arc::new(Metrics::new());
    let clients = AwsClients::from_config(&config).await;
    let reconciler = Reconciler::new(&config, clients, metrics)?;

    let summary = reconciler.run(&landing).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

async fn serve(args: ConfigArgs) -> anyhow::Result<()> {
    let config = Config::load(&args)?;

    tracing::info!(
        "Starting SFMC reconciliation API on port {}",
        config.api_port
    );

    // AWS Clients einmal pro Prozess
    let metrics = Arc::new(Metrics::new());
    let clients = AwsClients::from_config(&config).await;

    let recon_state = Arc::new(api::ReconState {
        reconciler: Reconciler::new(&config, clients, metrics.clone())?,
        default_landing: config.landing_s3_uri.clone(),
    });

    // Build routers
    let app = Router::new()
        // Health & Admin Routes
        .nest("/api/admin", api::admin_router(metrics))
        // Reconciliation Routes
        .nest("/api/recon", api::recon_router(recon_state))
        // Root health check
        .route("/health", get(health_check))
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api_port)).await?;

    tracing::info!("Server listening on port {}", config.api_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Root-Health-Check für den Load Balancer
async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Request-Log, Serverfehler als Warnung
async fn logging_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let start = std::time::Instant::now();
    let response = next.run(req).await;
    let duration_ms = start.elapsed().as_millis();
    let status = response.status();

    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), duration_ms, "Request failed");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), duration_ms, "Request completed");
    }

    response
}
