/*
 * GoAlert Integration Operator - Controller Service
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Operator Service - Kubernetes controller for `GoalertIntegration` CRDs
//!
//! This service keeps GoAlert alerting configuration in step with managed
//! cluster lifecycles by:
//! - Watching `GoalertIntegration` and managed-cluster custom resources
//! - Provisioning GoAlert services, integration keys, and heartbeat monitors
//! - Tearing alerting resources down when clusters leave scope
//! - Providing health and metrics endpoints

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use goalert_operator::goalert::GraphqlClient;
use goalert_operator::integration::types::{Context, GoAlertFactory};
use goalert_operator::{run_integration_controller, OperatorConfig, OperatorMetrics};
use serde_json::{json, Value};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    metrics: Arc<OperatorMetrics>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,goalert_operator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting GoAlert Integration Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Arc::new(load_operator_config());
    config.validate()?;

    // Initialize Kubernetes client
    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let metrics = Arc::new(OperatorMetrics::new());

    let goalert_factory: GoAlertFactory = {
        let config = config.clone();
        Arc::new(move |session| {
            Arc::new(GraphqlClient::new(
                &config.goalert.endpoint,
                session,
                Duration::from_secs(config.goalert.request_timeout_seconds),
            ))
        })
    };

    let context = Arc::new(Context {
        client: client.clone(),
        config: config.clone(),
        metrics: metrics.clone(),
        goalert: goalert_factory,
    });

    // Start the controller in the background
    let controller_handle = {
        let context = context.clone();
        tokio::spawn(async move {
            if let Err(e) = run_integration_controller(context).await {
                error!("Controller error: {}", e);
            }
        })
    };

    // Build the HTTP router
    let state = AppState { metrics };
    let app = Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(render_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(TimeoutLayer::new(Duration::from_secs(60))),
        )
        .with_state(state);

    // Start the HTTP server
    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr).await?;
    info!("Operator HTTP server listening on {}", config.http.bind_addr);

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller_handle.abort();
    info!("Operator service stopped");

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "goalert-operator",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "ready",
        "service": "goalert-operator",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render_prometheus()
}

fn load_operator_config() -> OperatorConfig {
    let override_path = std::env::var("OPERATOR_CONFIG_PATH").ok();
    let config_path = override_path
        .as_deref()
        .filter(|path| Path::new(path).exists())
        .unwrap_or("/config/config.yaml");

    match OperatorConfig::from_mounted_file(config_path) {
        Ok(cfg) => {
            info!("Loaded operator configuration from {}", config_path);
            cfg
        }
        Err(err) => {
            warn!(
                "Failed to load configuration from {}: {}. Using defaults.",
                config_path, err
            );
            let mut cfg = OperatorConfig::default();
            cfg.apply_env_fallbacks();
            cfg
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
