//! Tool Executor
//!
//! Executes one downstream HTTP request for an MCP tool call: validates the
//! supplied arguments against the declared parameter map, substitutes
//! `{{name}}` placeholders in the URL and payload template, injects the
//! tenant's downstream credential, and normalizes the outcome into a
//! [`ToolResult`].
//!
//! Downstream failures are application-level outcomes, never protocol
//! errors: every failure mode here resolves to `ToolResult.success = false`
//! with a human-readable message. A reachable downstream that answers with
//! 4xx/5xx is still a successful invocation carrying that status. Exactly
//! one outbound call per invocation; no retries.

use crate::domain::AuthScheme;
use crate::mcp::protocol::ToolResult;
use crate::storage::{ApiDefinitionData, CredentialData};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, error};

/// Static regex for `{{name}}` template placeholders
static TEMPLATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
        .expect("template placeholder regex is valid at compile time")
});

/// Executor for downstream tool HTTP calls
#[derive(Clone)]
pub struct ToolExecutor {
    client: reqwest::Client,
}

impl ToolExecutor {
    /// Create an executor whose downstream calls time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Execute a tool call against the tenant's downstream API.
    ///
    /// `credential` is the resolved credential of the backing API
    /// definition, or `None` when the definition references none.
    pub async fn execute(
        &self,
        definition: &ApiDefinitionData,
        credential: Option<&CredentialData>,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> ToolResult {
        // Required parameters first; nothing goes on the wire when one is
        // absent.
        for (name, spec) in &definition.parameters {
            if spec.required && !arguments.contains_key(name) {
                return ToolResult::failure(format!("Missing required parameter: {}", name));
            }
        }

        let url = match render_template(&definition.url_template, arguments) {
            Ok(url) => url,
            Err(token) => {
                return ToolResult::failure(format!(
                    "Unresolved template placeholder '{}' in URL",
                    token
                ));
            }
        };

        let payload = match &definition.payload_template {
            Some(template) => match render_template_value(template, arguments) {
                Ok(value) => Some(value),
                Err(token) => {
                    return ToolResult::failure(format!(
                        "Unresolved template placeholder '{}' in payload",
                        token
                    ));
                }
            },
            None => None,
        };

        debug!(
            definition_id = %definition.id,
            method = %definition.http_method,
            url = %url,
            has_payload = payload.is_some(),
            "Executing downstream tool request"
        );

        let request = match definition.http_method.to_uppercase().as_str() {
            "GET" => self.client.get(&url),
            "DELETE" => self.client.delete(&url),
            "HEAD" => self.client.head(&url),
            "POST" => {
                self.client.post(&url).json(&payload.clone().unwrap_or_else(default_payload))
            }
            "PUT" => self.client.put(&url).json(&payload.clone().unwrap_or_else(default_payload)),
            "PATCH" => {
                self.client.patch(&url).json(&payload.clone().unwrap_or_else(default_payload))
            }
            other => {
                return ToolResult::failure(format!("Unsupported HTTP method: {}", other));
            }
        };

        let request = apply_credential(request, credential);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, url = %url, "Downstream request failed");
                return ToolResult::failure(format!("HTTP request failed: {}", e));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to read downstream response body");
                return ToolResult::failure(format!("Failed to read response body: {}", e));
            }
        };

        debug!(status, body_length = body.len(), "Downstream request completed");

        // Any reachable downstream is a success at the protocol layer; the
        // status is carried for the caller to interpret.
        let data = serde_json::from_str(&body)
            .unwrap_or_else(|_| serde_json::Value::String(body));
        ToolResult::success(status, data)
    }
}

fn default_payload() -> serde_json::Value {
    serde_json::json!({})
}

/// Inject the downstream credential header, dispatched by scheme variant
fn apply_credential(
    request: reqwest::RequestBuilder,
    credential: Option<&CredentialData>,
) -> reqwest::RequestBuilder {
    let Some(credential) = credential else {
        return request;
    };

    match &credential.scheme {
        AuthScheme::None => request,
        AuthScheme::ApiKey { header, value } => request.header(header.as_str(), value.as_str()),
        AuthScheme::Bearer { token } => {
            request.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token))
        }
        AuthScheme::Basic { username, secret } => {
            let encoded = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, secret));
            request.header(reqwest::header::AUTHORIZATION, format!("Basic {}", encoded))
        }
    }
}

/// Substitute every `{{name}}` placeholder in a template string.
///
/// Returns the first unmatched placeholder name as the error.
fn render_template(
    template: &str,
    arguments: &serde_json::Map<String, serde_json::Value>,
) -> Result<String, String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last_end = 0;

    for captures in TEMPLATE_REGEX.captures_iter(template) {
        let whole = match captures.get(0) {
            Some(m) => m,
            None => continue,
        };
        let token = &captures[1];

        let value = arguments.get(token).ok_or_else(|| token.to_string())?;
        rendered.push_str(&template[last_end..whole.start()]);
        rendered.push_str(&argument_string_form(value));
        last_end = whole.end();
    }

    rendered.push_str(&template[last_end..]);
    Ok(rendered)
}

/// Substitute placeholders across every string leaf of a payload template
fn render_template_value(
    template: &serde_json::Value,
    arguments: &serde_json::Map<String, serde_json::Value>,
) -> Result<serde_json::Value, String> {
    match template {
        serde_json::Value::String(s) => {
            render_template(s, arguments).map(serde_json::Value::String)
        }
        serde_json::Value::Object(map) => {
            let mut rendered = serde_json::Map::new();
            for (key, value) in map {
                rendered.insert(key.clone(), render_template_value(value, arguments)?);
            }
            Ok(serde_json::Value::Object(rendered))
        }
        serde_json::Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| render_template_value(item, arguments))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(serde_json::Value::Array(rendered))
        }
        other => Ok(other.clone()),
    }
}

/// String form of an argument used during substitution
fn argument_string_form(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ApiDefinitionId, AuthScheme, CredentialId, ParameterSpec, ParameterType, TenantId,
    };
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn definition(http_method: &str, url: &str) -> ApiDefinitionData {
        ApiDefinitionData {
            id: ApiDefinitionId::from_string("def-1".to_string()),
            tenant_id: TenantId::from_string("tenant-1".to_string()),
            credential_id: None,
            tool_name: Some("test_tool".to_string()),
            description: None,
            http_method: http_method.to_string(),
            url_template: url.to_string(),
            parameters: BTreeMap::new(),
            payload_template: None,
            position: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn credential(scheme: AuthScheme) -> CredentialData {
        CredentialData {
            id: CredentialId::from_string("cred-1".to_string()),
            tenant_id: TenantId::from_string("tenant-1".to_string()),
            scheme,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn executor() -> ToolExecutor {
        ToolExecutor::new(Duration::from_secs(5))
    }

    fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().expect("arguments must be an object").clone()
    }

    #[test]
    fn test_render_template_substitutes_tokens() {
        let arguments = args(serde_json::json!({"id": "42", "limit": 10}));
        let rendered =
            render_template("https://api.test/items/{{id}}?limit={{limit}}", &arguments)
                .expect("render");
        assert_eq!(rendered, "https://api.test/items/42?limit=10");
    }

    #[test]
    fn test_render_template_reports_missing_token() {
        let arguments = args(serde_json::json!({"other": "x"}));
        let result = render_template("https://api.test/items/{{id}}", &arguments);
        assert_eq!(result, Err("id".to_string()));
    }

    #[test]
    fn test_render_template_value_walks_nested_leaves() {
        let template = serde_json::json!({
            "order": {"sku": "{{sku}}", "count": 2},
            "tags": ["{{tag}}", "fixed"]
        });
        let arguments = args(serde_json::json!({"sku": "A-1", "tag": "new"}));
        let rendered = render_template_value(&template, &arguments).expect("render");
        assert_eq!(rendered["order"]["sku"], "A-1");
        assert_eq!(rendered["order"]["count"], 2);
        assert_eq!(rendered["tags"][0], "new");
    }

    #[tokio::test]
    async fn test_missing_required_parameter_issues_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let mut definition = definition("GET", &format!("{}/items", server.uri()));
        definition.parameters.insert(
            "id".to_string(),
            ParameterSpec { param_type: ParameterType::String, required: true, description: None },
        );

        let result = executor().execute(&definition, None, &args(serde_json::json!({}))).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Missing required parameter: id"));
    }

    #[tokio::test]
    async fn test_unresolved_url_placeholder_issues_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let definition = definition("GET", &format!("{}/items/{{{{id}}}}", server.uri()));
        let result = executor().execute(&definition, None, &args(serde_json::json!({}))).await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("'id'"));
    }

    #[tokio::test]
    async fn test_unresolved_payload_placeholder_issues_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let mut definition = definition("POST", &format!("{}/orders", server.uri()));
        definition.payload_template = Some(serde_json::json!({"sku": "{{sku}}"}));

        let result = executor().execute(&definition, None, &args(serde_json::json!({}))).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("'sku'"));
    }

    #[tokio::test]
    async fn test_api_key_credential_injection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("X-API-Key", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let definition = definition("GET", &format!("{}/items", server.uri()));
        let credential = credential(AuthScheme::ApiKey {
            header: "X-API-Key".to_string(),
            value: "abc123".to_string(),
        });

        let result =
            executor().execute(&definition, Some(&credential), &args(serde_json::json!({}))).await;
        assert!(result.success);
        assert_eq!(result.status, Some(200));
        assert_eq!(result.data, Some(serde_json::json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_basic_credential_injection() {
        let server = MockServer::start().await;
        // base64("u:p") = "dTpw"
        Mock::given(method("GET"))
            .and(header("Authorization", "Basic dTpw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let definition = definition("GET", &format!("{}/items", server.uri()));
        let credential = credential(AuthScheme::Basic {
            username: "u".to_string(),
            secret: "p".to_string(),
        });

        let result =
            executor().execute(&definition, Some(&credential), &args(serde_json::json!({}))).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_bearer_credential_injection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let definition = definition("GET", &format!("{}/items", server.uri()));
        let credential = credential(AuthScheme::Bearer { token: "tok-123".to_string() });

        let result =
            executor().execute(&definition, Some(&credential), &args(serde_json::json!({}))).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_post_sends_substituted_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_json(serde_json::json!({"sku": "A-1", "note": "rush order"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 9})))
            .expect(1)
            .mount(&server)
            .await;

        let mut definition = definition("POST", &format!("{}/orders", server.uri()));
        definition.payload_template =
            Some(serde_json::json!({"sku": "{{sku}}", "note": "rush order"}));

        let result = executor()
            .execute(&definition, None, &args(serde_json::json!({"sku": "A-1"})))
            .await;
        assert!(result.success);
        assert_eq!(result.status, Some(201));
    }

    #[tokio::test]
    async fn test_downstream_error_status_is_still_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "boom"})),
            )
            .mount(&server)
            .await;

        let definition = definition("GET", &format!("{}/items", server.uri()));
        let result = executor().execute(&definition, None, &args(serde_json::json!({}))).await;

        assert!(result.success);
        assert_eq!(result.status, Some(500));
        assert_eq!(result.data, Some(serde_json::json!({"error": "boom"})));
    }

    #[tokio::test]
    async fn test_transport_failure_is_failed_result() {
        // Nothing listens on port 1.
        let definition = definition("GET", "http://127.0.0.1:1/items");
        let result = executor().execute(&definition, None, &args(serde_json::json!({}))).await;

        assert!(!result.success);
        assert!(result.status.is_none());
        assert!(result.error.as_deref().unwrap().contains("HTTP request failed"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_carried_as_string() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
            .mount(&server)
            .await;

        let definition = definition("GET", &format!("{}/items", server.uri()));
        let result = executor().execute(&definition, None, &args(serde_json::json!({}))).await;

        assert!(result.success);
        assert_eq!(result.data, Some(serde_json::json!("plain text")));
    }

    #[tokio::test]
    async fn test_unsupported_method_is_failed_result() {
        let definition = definition("TRACE", "http://127.0.0.1:1/items");
        let result = executor().execute(&definition, None, &args(serde_json::json!({}))).await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Unsupported HTTP method"));
    }
}
