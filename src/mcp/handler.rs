//! MCP Request Handler
//!
//! Routes incoming JSON-RPC requests to the appropriate method handlers.
//! A handler is built per request and holds no state across calls: tenant
//! configuration is re-read from the directory on every invocation, so
//! configuration edits apply on the next call with nothing to invalidate.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::mcp::error::McpError;
use crate::mcp::executor::ToolExecutor;
use crate::mcp::protocol::*;
use crate::mcp::tools::derive_tools;
use crate::storage::{TenantBundle, TenantDirectory};

/// Server name reported by `initialize`
pub const SERVER_NAME: &str = "toolgate";

pub struct McpHandler {
    directory: Arc<dyn TenantDirectory>,
    executor: ToolExecutor,
    tenant: String,
}

impl McpHandler {
    /// Create a handler for one tenant, addressed by id or slug
    pub fn new(directory: Arc<dyn TenantDirectory>, executor: ToolExecutor, tenant: String) -> Self {
        Self { directory, executor, tenant }
    }

    /// Handle an incoming JSON-RPC request.
    ///
    /// Every response carries the inbound id unchanged so callers can
    /// pipeline concurrent requests over one channel and correlate replies.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let method = request.method.clone();
        let id = request.id.clone();

        debug!(method = %method, id = ?id, tenant = %self.tenant, "Handling MCP request");

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id).await,
            "tools/list" => self.handle_tools_list(request.id).await,
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => self.error_response(request.id, McpError::MethodNotFound(request.method)),
        };

        debug!(
            method = %method,
            id = ?id,
            has_error = response.error.is_some(),
            "Completed MCP request"
        );

        response
    }

    async fn load_bundle(&self) -> Result<TenantBundle, McpError> {
        self.directory
            .get_tenant(&self.tenant)
            .await
            .map_err(|e| McpError::from_directory(e, &self.tenant))
    }

    /// `initialize` has no error conditions: an unresolvable tenant
    /// degrades the advertised tool count to zero.
    async fn handle_initialize(&self, id: Option<JsonRpcId>) -> JsonRpcResponse {
        let tools_count = match self.load_bundle().await {
            Ok(bundle) => bundle.api_definitions.len(),
            Err(e) => {
                warn!(tenant = %self.tenant, error = %e, "Tenant lookup failed during initialize");
                0
            }
        };

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                metadata: ServerMetadata { tools_count },
            },
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => self.error_response(id, McpError::SerializationError(e)),
        }
    }

    async fn handle_tools_list(&self, id: Option<JsonRpcId>) -> JsonRpcResponse {
        let bundle = match self.load_bundle().await {
            Ok(bundle) => bundle,
            Err(e) => return self.error_response(id, e),
        };

        let result = ToolsListResult { tools: derive_tools(&bundle) };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => self.error_response(id, McpError::SerializationError(e)),
        }
    }

    async fn handle_tools_call(&self, id: Option<JsonRpcId>, params: Value) -> JsonRpcResponse {
        let params: ToolCallRequest = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "Failed to parse tool call params");
                return self.error_response(
                    id,
                    McpError::InvalidParams(format!("Failed to parse tool call params: {}", e)),
                );
            }
        };

        let bundle = match self.load_bundle().await {
            Ok(bundle) => bundle,
            Err(e) => return self.error_response(id, e),
        };

        // Match the requested name against the derived tool set so renamed
        // duplicates resolve exactly as discovery advertised them.
        let tools = derive_tools(&bundle);
        let definition = bundle
            .api_definitions
            .iter()
            .zip(tools.iter())
            .find(|(_, tool)| tool.name == params.name)
            .map(|(definition, _)| definition);

        let Some(definition) = definition else {
            return self.error_response(id, McpError::ToolNotFound(params.name));
        };

        let has_required = definition.parameters.values().any(|spec| spec.required);
        if params.arguments.is_none() && has_required {
            return self.error_response(
                id,
                McpError::InvalidParams(format!(
                    "Tool '{}' requires arguments, but none were provided",
                    params.name
                )),
            );
        }

        let arguments = params.arguments.unwrap_or_default();
        let credential = bundle.credential_for(definition);
        let tool_result = self.executor.execute(definition, credential, &arguments).await;

        let text = match serde_json::to_string_pretty(&tool_result) {
            Ok(text) => text,
            Err(e) => return self.error_response(id, McpError::SerializationError(e)),
        };

        let result = ToolCallResult {
            content: vec![ContentBlock::Text { text }],
            is_error: if tool_result.success { None } else { Some(true) },
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => self.error_response(id, McpError::SerializationError(e)),
        }
    }

    fn error_response(&self, id: Option<JsonRpcId>, error: McpError) -> JsonRpcResponse {
        JsonRpcResponse::error(id, error.into())
    }
}
