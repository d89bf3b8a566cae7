//! Gateway HTTP API.
//!
//! - GET /
//! - POST /api/generate
//! - GET /api/providers
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::GatewayError;
use crate::metrics::Metrics;
use crate::provider::{ProviderId, ProviderRegistry};
use crate::request::{normalize, Mode, Model, Normalized};
use crate::server::docs;
use crate::server::streaming::sse_response;

/// Application state shared across handlers.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    pub start_time: Instant,
    upstream_error_status: Option<StatusCode>,
}

impl AppState {
    pub fn new(config: Arc<Config>, registry: ProviderRegistry) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let upstream_error_status = config.upstream_error_status()?;
        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            Arc::clone(&metrics),
            Duration::from_secs(config.upstream.timeout_secs),
        );

        Ok(Self {
            dispatcher,
            config,
            metrics,
            start_time: Instant::now(),
            upstream_error_status,
        })
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(docs::index))
        .route("/api/generate", post(generate))
        .route("/api/providers", get(list_providers))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ─── Response Types ────────────────────────────────────────────────────────

/// Normal-mode response body.
#[derive(Debug, Serialize)]
pub struct GenerationResult {
    pub model: Model,
    pub provider: ProviderId,
    pub mode: Mode,
    pub response: String,
}

/// Accepted values for each request field.
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub models: Vec<Model>,
    pub providers: Vec<ProviderId>,
    pub modes: Vec<Mode>,
    pub defaults: Defaults,
}

#[derive(Debug, Serialize)]
pub struct Defaults {
    pub model: Model,
    pub provider: ProviderId,
    pub mode: Mode,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub providers: usize,
    pub debug: bool,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn generate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    match handle_generate(&state, &request_id, body).await {
        Ok(response) => response,
        Err(err) => {
            state
                .metrics
                .rejected
                .with_label_values(&[err.reason()])
                .inc();
            info!(request_id = %request_id, error = %err, "Request rejected");
            err.into_response()
        }
    }
}

async fn handle_generate(
    state: &AppState,
    request_id: &str,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let Json(body) = body.map_err(|rejection| {
        debug!(request_id, %rejection, "Body is not JSON");
        GatewayError::NotJson
    })?;

    let Normalized { request, defaulted } = normalize(&body)?;
    for field in defaulted {
        state.metrics.defaulted.with_label_values(&[field]).inc();
    }
    state
        .metrics
        .requests
        .with_label_values(&[request.mode.as_str()])
        .inc();

    info!(
        request_id,
        model = %request.model,
        provider = %request.provider,
        mode = %request.mode,
        "Processing request"
    );

    match request.mode {
        Mode::Streaming => {
            let events = state.dispatcher.stream(request_id.to_string(), request);
            Ok(sse_response(events).into_response())
        }
        Mode::Normal => {
            let completion = state.dispatcher.complete(request_id, &request).await;
            let status = match state.upstream_error_status {
                Some(status) if completion.is_failed() => status,
                _ => StatusCode::OK,
            };

            let body = GenerationResult {
                model: request.model,
                provider: request.provider,
                mode: request.mode,
                response: completion.into_text(),
            };
            Ok((status, Json(body)).into_response())
        }
    }
}

async fn list_providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        models: Model::ALL.to_vec(),
        providers: ProviderId::ALL.to_vec(),
        modes: Mode::ALL.to_vec(),
        defaults: Defaults {
            model: Model::default(),
            provider: ProviderId::default(),
            mode: Mode::default(),
        },
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        providers: state.dispatcher.registry().len(),
        debug: state.config.server.debug,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
