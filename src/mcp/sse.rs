//! MCP SSE (Server-Sent Events) Transport
//!
//! Push-only discovery and liveness channel: each connection receives the
//! server descriptor once, the tenant's tool list once, then periodic
//! heartbeats that keep intermediaries from closing the idle connection.
//! Tool invocation is not supported here; callers use the synchronous RPC
//! endpoint for that.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info};

use crate::mcp::error::McpError;
use crate::mcp::handler::SERVER_NAME;
use crate::mcp::http::GatewayState;
use crate::mcp::protocol::{
    InitializeResult, JsonRpcResponse, ServerInfo, ServerMetadata, ToolsListResult,
    PROTOCOL_VERSION,
};
use crate::mcp::tools::derive_tools;
use crate::storage::TenantBundle;

/// One event on the discovery stream
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    ServerInfo(InitializeResult),
    ToolsList(ToolsListResult),
    Heartbeat { timestamp: String },
}

impl StreamEvent {
    /// SSE event name for this message
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::ServerInfo(_) => "server-info",
            StreamEvent::ToolsList(_) => "tools-list",
            StreamEvent::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Stream wrapper that logs teardown when the client disconnects.
///
/// The heartbeat interval is owned by the wrapped stream, so dropping this
/// wrapper tears the timer down with it; an abandoned connection leaves
/// nothing running.
struct CleanupStream<S> {
    inner: S,
    tenant: String,
}

impl<S> CleanupStream<S> {
    fn new(inner: S, tenant: String) -> Self {
        Self { inner, tenant }
    }
}

impl<S: Stream + Unpin> Stream for CleanupStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        info!(tenant = %self.tenant, "SSE connection closed, heartbeat stopped");
    }
}

/// Build the per-connection event sequence: `server-info`, `tools-list`,
/// then a heartbeat every `heartbeat` interval (the first one a full
/// interval after open).
pub fn discovery_stream(
    bundle: &TenantBundle,
    heartbeat: Duration,
) -> impl Stream<Item = StreamEvent> + Unpin {
    let server_info = StreamEvent::ServerInfo(InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: crate::VERSION.to_string(),
            metadata: ServerMetadata { tools_count: bundle.api_definitions.len() },
        },
    });
    let tools_list = StreamEvent::ToolsList(ToolsListResult { tools: derive_tools(bundle) });

    let heartbeats = IntervalStream::new(tokio::time::interval_at(
        tokio::time::Instant::now() + heartbeat,
        heartbeat,
    ))
    .map(|_| StreamEvent::Heartbeat { timestamp: chrono::Utc::now().to_rfc3339() });

    tokio_stream::iter(vec![server_info, tools_list]).chain(heartbeats)
}

/// Format a stream event as an SSE event
fn format_sse_event(message: &StreamEvent, event_id: u64) -> Result<Event, Infallible> {
    let data = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default().id(event_id.to_string()).event(message.event_type()).data(data))
}

/// GET /mcp/{tenant}/sse
///
/// Establishes the push discovery stream for one tenant. The tool list is
/// read fresh at connection time; clients wanting updated discovery
/// reconnect or call `tools/list` on the RPC endpoint.
pub async fn mcp_sse_handler(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
) -> Result<impl IntoResponse, Response> {
    let bundle = match state.directory.get_tenant(&tenant).await {
        Ok(bundle) => bundle,
        Err(e) => {
            error!(tenant = %tenant, error = %e, "Failed to resolve tenant for SSE");
            return Err(error_response(McpError::from_directory(e, &tenant)));
        }
    };

    info!(tenant = %bundle.tenant.slug, "SSE connection established");

    let mut event_id = 0u64;
    let events = discovery_stream(&bundle, state.heartbeat_interval).map(move |message| {
        event_id += 1;
        format_sse_event(&message, event_id)
    });

    let cleanup_stream = CleanupStream::new(events, bundle.tenant.slug.clone());

    Ok(Sse::new(cleanup_stream))
}

/// Error response for the SSE endpoint: an HTTP status carrying a JSON-RPC
/// error body
fn error_response(error: McpError) -> Response {
    let status = match &error {
        McpError::TenantNotFound(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = JsonRpcResponse::error(None, error.into());
    (status, Json(body)).into_response()
}
