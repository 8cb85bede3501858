//! HTTP trigger
//!
//! `POST /task` fans out a dispatch, `POST /` runs one work unit. Both answer
//! `200 {"result": ..}` or `500 {"error": {"kind", "message"}}` and nothing
//! else; the task queue treats any non-2xx as a failed delivery.

use super::app::App;
use crate::auth::UserToken;
use crate::dispatch::DispatchReport;
use crate::error::{Error, Result};
use crate::orchestrator::{RunSummary, WorkUnit};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Body of `POST /task`; both bounds are optional
#[derive(Debug, Default, Deserialize)]
struct DispatchRequest {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
}

/// Success body
#[derive(Debug, Serialize)]
struct ApiResult<T> {
    result: T,
}

fn success<T: Serialize>(result: T) -> Response {
    (StatusCode::OK, Json(ApiResult { result })).into_response()
}

fn failure(err: &Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": {
                "kind": err.kind(),
                "message": err.to_string(),
            }
        })),
    )
        .into_response()
}

fn respond<T: Serialize>(outcome: Result<T>) -> Response {
    match outcome {
        Ok(result) => success(result),
        Err(e) => failure(&e),
    }
}

/// Parse a JSON body; an empty body means all defaults
fn parse_body<T: serde::de::DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::config(format!("Invalid request body: {e}")))
}

/// Build the router
pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", post(run_unit))
        .route("/task", post(dispatch))
        .route("/health", get(health))
        .route("/auth", get(auth_redirect))
        .route("/auth/callback", get(auth_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Start the HTTP server
pub async fn serve(app: Arc<App>, port: u16) -> Result<()> {
    let router = router(app);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to port {port}: {e}")))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn dispatch(State(app): State<Arc<App>>, body: Bytes) -> Response {
    respond(dispatch_body(&app, &body).await)
}

async fn dispatch_body(app: &App, body: &Bytes) -> Result<DispatchReport> {
    let request: DispatchRequest = parse_body(body)?;
    let range = app.dispatch_range(request.start.as_deref(), request.end.as_deref())?;
    app.dispatch(range).await
}

async fn run_unit(State(app): State<Arc<App>>, body: Bytes) -> Response {
    respond(run_body(&app, &body).await)
}

async fn run_body(app: &App, body: &Bytes) -> Result<RunSummary> {
    let unit: WorkUnit = serde_json::from_slice(body)
        .map_err(|e| Error::config(format!("Invalid work unit: {e}")))?;
    app.run(&unit).await
}

async fn auth_redirect(State(app): State<Arc<App>>) -> Response {
    match app.oauth().and_then(|flow| flow.authorize_url()) {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(e) => failure(&e),
    }
}

async fn auth_callback(
    State(app): State<Arc<App>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    respond(exchange(&app, query.code.as_deref().unwrap_or_default()).await)
}

async fn exchange(app: &App, code: &str) -> Result<UserToken> {
    app.oauth()?.exchange_code(code).await
}
