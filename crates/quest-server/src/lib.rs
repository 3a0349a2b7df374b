//! # quest-server
//!
//! HTTP surface for the quest engine:
//!
//! - `POST /solve` validates the task-start credential and launches a background session
//! - `GET /healthz` and `GET /` for liveness and discovery
//! - `GET /metrics` in Prometheus text format
//! - `GET /api/v1/sessions[/{id}]` for inspecting live and finished sessions, behind
//!   `Authorization: Bearer <task secret>`

pub mod metrics;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use quest_config::{ServerConfig, TaskConfig};
use quest_core::{QuestError, Task};
use quest_runtime::Launcher;

/// Shared server state.
pub struct AppState {
    /// Expected task-start credential and contact address.
    pub task: TaskConfig,
    pub launcher: Launcher,
    pub metrics: metrics::Metrics,
}

/// Task-start request body.
#[derive(Deserialize)]
struct SolveRequest {
    email: String,
    secret: String,
    url: String,
}

/// Build the Axum router. Must be called inside a Tokio runtime: the metrics subscriber
/// is spawned here.
pub fn build_router(config: &ServerConfig, task: TaskConfig, launcher: Launcher) -> Router {
    let metrics = metrics::Metrics::new();
    metrics.watch(launcher.controller().events());

    let state = Arc::new(AppState {
        task,
        launcher,
        metrics,
    });

    // Session records carry full turn histories, remote responses included.
    let session_routes = Router::new()
        .route("/api/v1/sessions", get(sessions_handler))
        .route("/api/v1/sessions/{id}", get(session_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let mut router = Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/solve", post(solve_handler))
        .merge(session_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

fn error_response(state: &AppState, status: StatusCode, detail: &str) -> Response {
    state.metrics.inc_http_errors();
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// Requires the task secret as a bearer token. Without a configured secret the
/// inspection routes stay closed.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.task.secret.as_deref().filter(|s| !s.is_empty()) else {
        warn!("refusing session inspection: task secret is not configured");
        return error_response(
            &state,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error",
        );
    };
    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => next.run(request).await,
        _ => {
            warn!("unauthorized session inspection: invalid or missing bearer token");
            error_response(&state, StatusCode::UNAUTHORIZED, "Unauthorized")
        }
    }
}

async fn root_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.metrics.inc_http_requests();
    Json(json!({
        "service": "quest",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /solve": "Start a session for a challenge URL",
            "GET /healthz": "Health check",
            "GET /metrics": "Prometheus metrics",
            "GET /api/v1/sessions": "List sessions (Bearer <task secret>)",
            "GET /api/v1/sessions/{id}": "Inspect one session (Bearer <task secret>)",
        }
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.metrics.inc_http_requests();
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.metrics.uptime_secs(),
    }))
}

async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (
    StatusCode,
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
) {
    let body = state.metrics.render_prometheus();
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

/// Accept a task, check its credential and start a session without waiting on it.
async fn solve_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    state.metrics.inc_http_requests();

    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "rejecting task: body is not JSON");
            state.metrics.inc_solve_rejected();
            return error_response(&state, StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };
    let request: SolveRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "rejecting task: malformed request");
            state.metrics.inc_solve_rejected();
            return error_response(&state, StatusCode::BAD_REQUEST, "Invalid request format");
        }
    };

    if let Err(e) = check_credentials(&state.task, &request) {
        state.metrics.inc_solve_rejected();
        return match e {
            QuestError::Unauthorized(_) => {
                warn!("rejecting task: invalid secret");
                error_response(&state, StatusCode::FORBIDDEN, "Invalid secret")
            }
            other => {
                warn!(error = %other, "rejecting task: server is not configured");
                error_response(
                    &state,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error",
                )
            }
        };
    }

    let task = Task {
        email: request.email,
        secret: request.secret,
        url: request.url,
    };
    let target = task.url.clone();
    let session_id = state.launcher.launch(task);
    state.metrics.inc_solve_accepted();
    info!(session = %session_id, target = %target, "task accepted");

    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// The secret must match the configured one. An email mismatch is only logged.
fn check_credentials(expected: &TaskConfig, request: &SolveRequest) -> quest_core::Result<()> {
    let secret = expected
        .secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QuestError::Config("task secret is not configured".into()))?;
    if request.secret != secret {
        return Err(QuestError::Unauthorized("secret mismatch".into()));
    }
    if let Some(ref email) = expected.email
        && *email != request.email
    {
        warn!(expected = %email, got = %request.email, "email mismatch, accepting anyway");
    }
    Ok(())
}

async fn sessions_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.metrics.inc_http_requests();
    let table = state.launcher.table();
    Json(json!({
        "running": table.running(),
        "sessions": table.list(),
    }))
}

async fn session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    state.metrics.inc_http_requests();
    let Ok(id) = Uuid::parse_str(&id) else {
        return error_response(&state, StatusCode::BAD_REQUEST, "Invalid session id");
    };
    match state.launcher.table().get(&id) {
        Some(record) => Json(record).into_response(),
        None => error_response(&state, StatusCode::NOT_FOUND, "Session not found"),
    }
}

/// Start the HTTP server and serve until Ctrl-C.
pub async fn start_server(
    config: &ServerConfig,
    task: TaskConfig,
    launcher: Launcher,
) -> quest_core::Result<()> {
    let router = build_router(config, task, launcher);

    info!(listen = %config.listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .map_err(|e| QuestError::Http(format!("failed to bind {}: {}", config.listen, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(|e| QuestError::Http(format!("server error: {}", e)))?;

    Ok(())
}
