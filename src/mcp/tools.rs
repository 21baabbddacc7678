//! Tool Derivation
//!
//! Turns one tenant's stored API definitions into MCP tool descriptors.
//! Pure functions of stored data: no I/O, nothing cached. The derived set
//! preserves the stored definition order, and derivation is deterministic,
//! so two calls over unchanged configuration yield identical tool lists.

use crate::mcp::protocol::Tool;
use crate::storage::{ApiDefinitionData, TenantBundle};
use std::collections::HashSet;

/// Derive the full tool set for a tenant, one tool per API definition.
///
/// Tool names are unique within the result: a declared name that collides
/// with an earlier definition's name falls back to the deterministic slug.
pub fn derive_tools(bundle: &TenantBundle) -> Vec<Tool> {
    let mut seen = HashSet::new();
    bundle
        .api_definitions
        .iter()
        .map(|definition| {
            let mut tool = derive_tool(definition);
            if !seen.insert(tool.name.clone()) {
                tool.name = generated_tool_name(definition);
                seen.insert(tool.name.clone());
            }
            tool
        })
        .collect()
}

/// Derive a single tool from one API definition
pub fn derive_tool(definition: &ApiDefinitionData) -> Tool {
    Tool {
        name: tool_name(definition),
        description: Some(description(definition)),
        input_schema: input_schema(definition),
    }
}

/// Tool name from the declared name or a deterministic slug.
///
/// The slug is derived from the URL path, method, and an id prefix so that
/// two definitions with the same path stay distinct.
fn tool_name(definition: &ApiDefinitionData) -> String {
    if let Some(name) = &definition.tool_name {
        if !name.trim().is_empty() {
            return name.clone();
        }
    }
    generated_tool_name(definition)
}

fn generated_tool_name(definition: &ApiDefinitionData) -> String {
    let method = definition.http_method.to_lowercase();

    let path = definition
        .url_template
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&definition.url_template)
        .split_once('/')
        .map(|(_, path)| path)
        .unwrap_or("");

    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_start_matches("{{")
                .trim_end_matches("}}")
                .replace('-', "_")
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|s| !s.is_empty())
        .collect();

    let path_part = if segments.is_empty() { "root".to_string() } else { segments.join("_") };

    let id = definition.id.as_str();
    let id_prefix = &id[..8.min(id.len())];

    format!("api_{}_{}_{}", path_part, method, id_prefix)
}

/// Description from the declared metadata or method + URL fallback
fn description(definition: &ApiDefinitionData) -> String {
    if let Some(description) = &definition.description {
        if !description.trim().is_empty() {
            return description.clone();
        }
    }
    format!("{} {}", definition.http_method.to_uppercase(), definition.url_template)
}

/// Build the JSON Schema input object from the declared parameter map
fn input_schema(definition: &ApiDefinitionData) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (name, spec) in &definition.parameters {
        let mut property = serde_json::Map::new();
        property.insert("type".to_string(), serde_json::json!(spec.param_type.json_type()));
        if let Some(description) = &spec.description {
            property.insert("description".to_string(), serde_json::json!(description));
        }
        properties.insert(name.clone(), serde_json::Value::Object(property));

        if spec.required {
            required.push(name.clone());
        }
    }

    let mut schema = serde_json::Map::new();
    schema.insert("type".to_string(), serde_json::json!("object"));
    schema.insert("properties".to_string(), serde_json::Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), serde_json::json!(required));
    }
    schema.insert("additionalProperties".to_string(), serde_json::json!(false));

    serde_json::Value::Object(schema)
}
