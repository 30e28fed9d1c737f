// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use timeloc_server::{
    api::router,
    auth::AuthGate,
    config::{AppConfig, LOG_FORMAT_ENV},
    logging::{self, LogFormat},
    metrics::PrometheusMetrics,
    state::AppState,
    store::InMemoryStore,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    // Subscriber first so config-time security warnings are not lost.
    let log_format = std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|value| value.parse::<LogFormat>().ok())
        .unwrap_or_default();
    logging::init(log_format);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(PrometheusMetrics::new()?);

    let gate = AuthGate::from_policy(config.auth, metrics.clone())
        .await?
        .with_verify_timeout(config.verify_timeout);

    let state = AppState::new(InMemoryStore::new(), gate, metrics);
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Timeloc server listening (docs at /docs)");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
