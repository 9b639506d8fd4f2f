//! HTTP surface of the agent.
//!
//! - `POST /webhook`: inbound WhatsApp message (form body), TwiML reply
//! - `GET /` and `GET /health`: liveness with per-server health
//! - `GET /tools`: aggregated tool list under qualified names
//! - `POST /refresh`: re-fetch every server's tool list

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::agent::Agent;
use crate::aggregator::ToolAggregator;
use crate::lifecycle;
use crate::protocol::ToolDescriptor;

use super::signature::{SignatureValidator, SIGNATURE_HEADER};

const EMPTY_MESSAGE_REPLY: &str =
    "Envíame una pregunta sobre tu negocio, por ejemplo: ¿cuánto vendí hoy?";

/// Shared state of the agent routes.
#[derive(Clone)]
pub struct WebhookState {
    agent: Arc<Agent>,
    aggregator: Arc<ToolAggregator>,
    validator: Option<SignatureValidator>,
    public_url: Option<String>,
}

impl WebhookState {
    /// State without signature validation.
    pub fn new(agent: Arc<Agent>, aggregator: Arc<ToolAggregator>) -> Self {
        Self {
            agent,
            aggregator,
            validator: None,
            public_url: None,
        }
    }

    /// Require signed requests.
    ///
    /// `public_url` is the webhook URL as the provider calls it; when unset
    /// it is rebuilt from the `Host` header and the request path.
    pub fn with_signature(mut self, validator: SignatureValidator, public_url: Option<String>) -> Self {
        self.validator = Some(validator);
        self.public_url = public_url;
        self
    }

    fn signed_url(&self, headers: &HeaderMap, uri: &Uri) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("https");
        format!("{}://{}{}", scheme, host, uri)
    }
}

/// Build the agent router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/refresh", post(refresh))
        .route("/webhook", post(webhook))
        .with_state(state)
}

/// Bind `addr` and serve the agent until ctrl-c.
pub async fn serve(state: WebhookState, addr: SocketAddr) -> Result<()> {
    let listener = lifecycle::bind(addr).await?;
    info!(%addr, signed = state.validator.is_some(), "Agent listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(lifecycle::shutdown_signal())
        .await
        .context("Agent server terminated abnormally")?;

    info!("Agent stopped");
    Ok(())
}

/// Escape text for an XML element body.
pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Wrap a reply in a TwiML message document.
pub fn twiml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n    <Message>{}</Message>\n</Response>",
        xml_escape(message)
    )
}

fn twiml_response(message: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        twiml(message),
    )
        .into_response()
}

async fn webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    uri: Uri,
    Form(params): Form<BTreeMap<String, String>>,
) -> Response {
    if let Some(validator) = &state.validator {
        let url = state.signed_url(&headers, &uri);
        let signature = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());
        if let Err(e) = validator.validate(&url, &params, signature) {
            warn!(error = %e, %url, "Rejected unsigned webhook request");
            return (StatusCode::FORBIDDEN, e.to_string()).into_response();
        }
    }

    let Some(from) = params.get("From").map(|s| s.trim()).filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing 'From'").into_response();
    };
    let body = params.get("Body").map(|s| s.trim()).unwrap_or("");

    if body.is_empty() {
        return twiml_response(EMPTY_MESSAGE_REPLY);
    }

    let reply = state.agent.process_message(from, body).await;
    info!(user = from, chars = reply.chars().count(), "Replying");
    twiml_response(&reply)
}

async fn health(State(state): State<WebhookState>) -> Json<Value> {
    let servers = state.aggregator.health().await;
    let tools: usize = servers.iter().map(|s| s.tools).sum();
    Json(json!({
        "status": "ok",
        "service": "cerebro",
        "version": env!("CARGO_PKG_VERSION"),
        "servers": servers,
        "tools": tools,
    }))
}

async fn list_tools(State(state): State<WebhookState>) -> Json<Value> {
    let tools: Vec<ToolDescriptor> = state
        .aggregator
        .list_all_tools()
        .into_iter()
        .map(|(name, descriptor)| ToolDescriptor {
            name: name.to_string(),
            ..descriptor
        })
        .collect();
    Json(json!({ "tools": tools }))
}

async fn refresh(State(state): State<WebhookState>) -> Json<Value> {
    let refreshed = state.aggregator.refresh_all().await;
    let tools = state.aggregator.list_all_tools().len();
    info!(refreshed, tools, "Tool lists refreshed");
    Json(json!({
        "refreshed": refreshed,
        "servers": state.aggregator.server_ids(),
        "tools": tools,
    }))
}
