//! HTTP surface of a tool server.
//!
//! - `GET /` and `GET /health`: liveness document
//! - `GET /tools`: `{"tools": [...]}`
//! - `POST /call`: `{"name", "arguments"}` → `{"success", "content" | "error"}`

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::lifecycle;
use crate::protocol::{ToolCallRequest, ToolCallResult, ToolList};
use crate::registry::ToolSet;

use super::ToolServer;

/// Build the router for a tool server.
pub fn router<S: ToolSet>(server: ToolServer<S>) -> Router {
    Router::new()
        .route("/", get(health::<S>))
        .route("/health", get(health::<S>))
        .route("/tools", get(list_tools::<S>))
        .route("/call", post(call_tool::<S>))
        .with_state(server)
}

/// Bind `addr` and serve the tool server until ctrl-c.
pub async fn serve<S: ToolSet>(server: ToolServer<S>, addr: SocketAddr) -> Result<()> {
    let name = server.name().to_string();
    let tools = server.registry().len();
    let listener = lifecycle::bind(addr).await?;

    info!(server = %name, %addr, tools, "Tool server listening");

    axum::serve(listener, router(server))
        .with_graceful_shutdown(lifecycle::shutdown_signal())
        .await
        .with_context(|| format!("Tool server '{}' terminated abnormally", name))?;

    info!(server = %name, "Tool server stopped");
    Ok(())
}

async fn health<S: ToolSet>(State(server): State<ToolServer<S>>) -> Json<Value> {
    Json(server.health())
}

async fn list_tools<S: ToolSet>(State(server): State<ToolServer<S>>) -> Json<ToolList> {
    Json(ToolList {
        tools: server.list_tools(),
    })
}

async fn call_tool<S: ToolSet>(
    State(server): State<ToolServer<S>>,
    payload: Result<Json<ToolCallRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(server = server.name(), error = %rejection.body_text(), "Rejected malformed call body");
            let body = ToolCallResult::failure(format!(
                "invalid call request: {}",
                rejection.body_text()
            ));
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    info!(server = server.name(), tool = %request.name, "Tool call");
    Json(server.call_tool(request).await).into_response()
}
