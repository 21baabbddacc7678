//! MCP HTTP Transport
//!
//! Synchronous JSON-RPC endpoint: one RpcMessage in, one RpcMessage out,
//! tenant selected by the path parameter. The body is parsed by hand so a
//! malformed frame comes back as a JSON-RPC parse error rather than a bare
//! transport rejection.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::mcp::error::McpError;
use crate::mcp::handler::McpHandler;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::{executor::ToolExecutor, sse};
use crate::storage::TenantDirectory;

/// Shared state for the gateway's HTTP surface
#[derive(Clone)]
pub struct GatewayState {
    pub directory: Arc<dyn TenantDirectory>,
    pub executor: ToolExecutor,
    pub heartbeat_interval: Duration,
}

impl GatewayState {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        executor: ToolExecutor,
        heartbeat_interval: Duration,
    ) -> Self {
        Self { directory, executor, heartbeat_interval }
    }
}

/// Build the gateway router: synchronous RPC, SSE discovery, and health.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/mcp/{tenant}", post(mcp_http_handler))
        .route("/mcp/{tenant}/sse", get(sse::mcp_sse_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /mcp/{tenant}
///
/// Accepts one JSON-RPC 2.0 request and returns one response. The calling
/// agent is not authenticated; only the downstream tenant API is.
pub async fn mcp_http_handler(
    State(state): State<GatewayState>,
    Path(tenant): Path<String>,
    body: String,
) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, tenant = %tenant, "Failed to parse JSON-RPC request body");
            return Json(JsonRpcResponse::error(
                None,
                McpError::ParseError(e.to_string()).into(),
            ));
        }
    };

    debug!(method = %request.method, id = ?request.id, tenant = %tenant, "Received MCP HTTP request");

    let handler = McpHandler::new(state.directory.clone(), state.executor.clone(), tenant);
    Json(handler.handle_request(request).await)
}
