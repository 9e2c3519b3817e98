//! FlareSolverr-compatible HTTP gateway: binds the challenge detection,
//! solver chain, browser pool, session manager, and auth crates behind
//! a small axum surface.

pub mod auth_mw;
pub mod config;
pub mod error;
pub mod idle;
pub mod pipeline;
pub mod state;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use state::AppState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn index() -> impl IntoResponse {
    Json(json!({
        "msg": "flaregate is ready.",
        "version": state::VERSION,
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pool_size = state.pool.size().await;
    Json(json!({
        "status": "ok",
        "poolSize": pool_size,
    }))
}

async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

async fn v1_handler(State(state): State<AppState>, Json(req): Json<pipeline::V1Request>) -> impl IntoResponse {
    let counted = state.idle.on_enter("/v1", None);

    let deadline = req
        .max_timeout
        .map(Duration::from_millis)
        .unwrap_or(state.challenge_timeout)
        .min(state.challenge_timeout);

    let cancel = CancellationToken::new();
    let timer_token = cancel.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        timer_token.cancel();
    });

    // The cancellation token above lets anything sitting in a pool/session
    // wait unwind cleanly; this hard backstop bounds the whole request even
    // if navigation or a solver never looks at `cancel` at all.
    let outcome = tokio::time::timeout(deadline + Duration::from_millis(500), pipeline::handle(&state, req, cancel)).await;
    timer.abort();
    state.idle.on_exit(counted);

    let result = match outcome {
        Ok(r) => r,
        Err(_) => Err(error::GatewayError::DeadlineExceeded),
    };

    match result {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(pipeline::V1Response::error("not found")))
}

/// Minimal description of the `/v1` command surface. Hand-maintained
/// rather than generated, since the wire shape is small and fixed.
fn openapi_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "flaregate",
            "version": state::VERSION,
            "description": "FlareSolverr-compatible anti-bot bypass gateway",
        },
        "paths": {
            "/v1": {
                "post": {
                    "summary": "Dispatch a FlareSolverr-style command",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "type": "object", "required": ["cmd"] },
                            },
                        },
                    },
                    "responses": {
                        "200": { "description": "Command result" },
                    },
                },
            },
            "/health": { "get": { "summary": "Liveness/readiness probe", "responses": { "200": { "description": "ok" } } } },
        },
    })
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi_spec())
}

async fn openapi_yaml() -> impl IntoResponse {
    let yaml = serde_yaml::to_string(&openapi_spec()).unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/yaml")], yaml)
}

async fn docs() -> impl IntoResponse {
    let html = r#"<!DOCTYPE html>
<html>
<head><title>flaregate API</title></head>
<body>
<div id="swagger-ui"></div>
<script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
<script>
  window.onload = () => SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
</script>
</body>
</html>"#;
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

/// Tracks activity on every request (including bypassed ones) so the
/// idle monitor sees accurate traffic, regardless of auth outcome.
async fn track_activity(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let counted = state.idle.on_enter(&path, user_agent.as_deref());
    let response = next.run(request).await;
    state.idle.on_exit(counted);
    response
}

/// Assembles the full router: public endpoints, the authenticated `/v1`
/// surface, and `/metrics` fed by its own Prometheus recorder handle.
pub fn build_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let v1 = Router::new()
        .route("/v1", post(v1_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_mw::require_identity))
        .with_state(state.clone());

    let metrics_router = Router::new()
        .route("/metrics", get(metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/livez", get(health))
        .route("/readyz", get(health))
        .route("/openapi.json", get(openapi_json))
        .route("/openapi.yaml", get(openapi_yaml))
        .route("/docs", get(docs))
        .with_state(state.clone())
        .merge(v1)
        .merge(metrics_router)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state, track_activity))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
