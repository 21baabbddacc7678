//! Domain layer
//!
//! Pure domain value types with zero infrastructure dependencies: typed
//! identifiers, the downstream credential scheme, and the declared
//! parameter specifications that tool input schemas are derived from.

pub mod id;

pub use id::{ApiDefinitionId, CredentialId, TenantId};

use serde::{Deserialize, Serialize};

/// Downstream authentication scheme attached to an API definition.
///
/// A closed sum type dispatched by pattern match in the tool executor.
/// Credential material is never serialized to MCP callers; serde here is
/// for storage round-trips only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// No authentication header is added
    None,
    /// A named header carrying a static key value
    ApiKey { header: String, value: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// `Authorization: Basic base64(username:secret)`
    Basic { username: String, secret: String },
}

impl AuthScheme {
    /// Storage discriminant for this scheme
    pub fn kind(&self) -> &'static str {
        match self {
            AuthScheme::None => "none",
            AuthScheme::ApiKey { .. } => "api_key",
            AuthScheme::Bearer { .. } => "bearer",
            AuthScheme::Basic { .. } => "basic",
        }
    }
}

/// Declared type of a single tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    /// JSON Schema type keyword for this parameter type
    pub fn json_type(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }
}

/// Declared specification of one tool parameter.
///
/// Stored per API definition as a `name -> spec` map and validated
/// structurally at call time; there is no reflection involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
