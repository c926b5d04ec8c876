use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::conversation::{ConversationMessage, ReplySource, Role};
use crate::error::ReplyError;
use crate::resolver::ReplyResolver;
use crate::runtime::BackendRuntime;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

const MESSAGES_NOT_ARRAY: &str = "messages must be an array";

#[derive(Clone)]
pub struct ServerState {
    pub resolver: ReplyResolver,
    pub key_present: bool,
}

/// Per-request id echoed in every body and in the `x-correlation-id` header.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    cid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugEnvResponse {
    key_present: bool,
    cid: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    cid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'static str>,
}

impl ChatResponse {
    fn failure(error: &'static str, cid: String) -> Self {
        Self {
            success: false,
            reply: None,
            error: Some(error),
            cid,
            source: None,
        }
    }
}

pub async fn serve_backend(runtime: BackendRuntime) -> Result<()> {
    let bind_addr = runtime
        .config
        .bind_addr
        .parse::<SocketAddr>()
        .with_context(|| {
            format!(
                "Invalid bind address '{}' (expected host:port)",
                runtime.config.bind_addr
            )
        })?;

    let state = Arc::new(ServerState {
        resolver: runtime.resolver.clone(),
        key_present: runtime.key_present,
    });
    let app = router(state, Some(&runtime.config.allowed_origin));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind backend server to {}", bind_addr))?;
    tracing::info!("Caligula backend listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Backend server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub fn router(state: Arc<ServerState>, allowed_origin: Option<&str>) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(health))
        .route("/api/debug/env", get(debug_env))
        .route("/api/chat", post(chat))
        .with_state(state);

    if let Some(cors) = allowed_origin.and_then(cors_layer) {
        app = app.layer(cors);
    }

    app.layer(middleware::from_fn(correlation_middleware))
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = origin.trim();
    if origin.is_empty() {
        return None;
    }
    match HeaderValue::from_str(origin) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .expose_headers([HeaderName::from_static(CORRELATION_HEADER)]),
        ),
        Err(_) => {
            tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
            None
        }
    }
}

async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let cid = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(CorrelationId(cid.clone()));

    let started = Instant::now();
    let mut response = with_json_error_body(next.run(request).await, &cid);

    if let Ok(value) = HeaderValue::from_str(&cid) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    tracing::info!(
        "cid={} {} {} {} {}ms",
        cid,
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Error responses produced outside the handlers (unknown route, wrong
/// method, oversized body) get the same `{success, error, cid}` body as
/// chat failures.
fn with_json_error_body(response: Response, cid: &str) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if is_json || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    let body = serde_json::json!({
        "success": false,
        "error": status_label(status),
        "cid": cid,
    });
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body.to_string()))
}

fn status_label(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(|reason| reason.to_ascii_lowercase().replace([' ', '-'], "_"))
        .unwrap_or_else(|| "error".to_string())
}

async fn health(Extension(cid): Extension<CorrelationId>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        cid: cid.0,
    })
}

async fn debug_env(
    State(state): State<Arc<ServerState>>,
    Extension(cid): Extension<CorrelationId>,
) -> Json<DebugEnvResponse> {
    Json(DebugEnvResponse {
        key_present: state.key_present,
        cid: cid.0,
    })
}

async fn chat(
    State(state): State<Arc<ServerState>>,
    Extension(cid): Extension<CorrelationId>,
    body: Bytes,
) -> Response {
    let CorrelationId(cid) = cid;

    let history = match parse_chat_request(&body) {
        Ok(history) => history,
        Err(error) => {
            tracing::info!("cid={} rejected chat request: {}", cid, error);
            return (
                StatusCode::BAD_REQUEST,
                Json(ChatResponse::failure(error, cid)),
            )
                .into_response();
        }
    };

    match state.resolver.resolve(&history).await {
        Ok(outcome) => {
            let source = match &outcome.source {
                ReplySource::Local(pattern_id) => {
                    tracing::info!("cid={} answered locally by '{}'", cid, pattern_id);
                    Some("local")
                }
                ReplySource::Remote => None,
            };
            Json(ChatResponse {
                success: true,
                reply: Some(outcome.text),
                error: None,
                cid,
                source,
            })
            .into_response()
        }
        Err(ReplyError::NoUserMessage) => (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::failure("no_user_message", cid)),
        )
            .into_response(),
        Err(error) => {
            tracing::error!("cid={} chat_failed kind={}: {}", cid, error.kind(), error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse::failure("server_error", cid)),
            )
                .into_response()
        }
    }
}

/// Pull the conversation out of a `{"messages": [...]}` body.
///
/// Entries without a known role or a string `text` are skipped; whether any
/// user turn remains is the resolver's call.
fn parse_chat_request(body: &[u8]) -> Result<Vec<ConversationMessage>, &'static str> {
    let document: Value = serde_json::from_slice(body).map_err(|_| MESSAGES_NOT_ARRAY)?;
    let entries = document
        .get("messages")
        .and_then(Value::as_array)
        .ok_or(MESSAGES_NOT_ARRAY)?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let role = entry.get("role").and_then(Value::as_str).and_then(Role::parse)?;
            let text = entry.get("text").and_then(Value::as_str)?;
            Some(ConversationMessage {
                role,
                text: text.to_string(),
            })
        })
        .collect())
}
