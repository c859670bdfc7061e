//! Triage Server
//!
//! Receives support platform webhooks, classifies ticket priority with the
//! rule evaluator and/or a language model, and labels the ticket.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

use triage_server::cli::Cli;
use triage_server::{create_router, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting triage server");

    let config = ServiceConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded from {}", cli.config);
    info!("Mode: {:?}", config.classifier.mode);
    info!(
        "Model: {} via {}",
        config.classifier.model.model, config.classifier.model.provider
    );
    info!("Auto-label threshold: {}", config.labels.auto_label_threshold);

    let metrics_handle = init_metrics()?;

    let addr: SocketAddr = config.listen_addr().parse()?;
    let state = AppState::new(config, metrics_handle)?;
    info!("Application state initialized");

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("triage=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("triage=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "triage_events_total",
        "Webhook events received by event type"
    );
    metrics::describe_counter!(
        "triage_classifications_total",
        "Classifications by method and priority band"
    );
    metrics::describe_histogram!(
        "triage_classification_latency_ms",
        metrics::Unit::Milliseconds,
        "End-to-end classification latency in milliseconds"
    );
    metrics::describe_counter!(
        "triage_labels_applied_total",
        "Priority labels written to the support platform"
    );
    metrics::describe_counter!("triage_errors_total", "Label and store failures by kind");

    info!("Metrics exporter initialized");
    Ok(handle)
}
