//! # Tenant Directory Repository
//!
//! Storage access for tenants, their configured API definitions, and the
//! downstream credentials those definitions reference. The gateway consumes
//! this module exclusively through the [`TenantDirectory`] trait: a
//! read-only lookup-by-id contract plus a directory listing used for
//! generated IDE configuration. Runtime queries with structured row types,
//! converted into public `*Data` structs.

use crate::domain::{ApiDefinitionId, AuthScheme, CredentialId, ParameterSpec, TenantId};
use crate::errors::{Result, ToolgateError};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

/// Database row structure for tenants
#[derive(Debug, Clone, FromRow)]
struct TenantRow {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tenant identity data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantData {
    pub id: TenantId,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TenantRow> for TenantData {
    fn from(row: TenantRow) -> Self {
        Self {
            id: TenantId::from_string(row.id),
            slug: row.slug,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row structure for credentials
#[derive(Debug, Clone, FromRow)]
struct CredentialRow {
    pub id: String,
    pub tenant_id: String,
    pub auth_type: String,
    pub header_name: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Downstream credential data
#[derive(Debug, Clone)]
pub struct CredentialData {
    pub id: CredentialId,
    pub tenant_id: TenantId,
    pub scheme: AuthScheme,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for CredentialData {
    type Error = ToolgateError;

    fn try_from(row: CredentialRow) -> Result<Self> {
        let missing = |column: &str| {
            ToolgateError::validation(format!(
                "Credential '{}' of type '{}' is missing column '{}'",
                row.id, row.auth_type, column
            ))
        };

        let scheme = match row.auth_type.as_str() {
            "none" => AuthScheme::None,
            "api_key" => AuthScheme::ApiKey {
                header: row.header_name.clone().ok_or_else(|| missing("header_name"))?,
                value: row.secret.clone().ok_or_else(|| missing("secret"))?,
            },
            "bearer" => {
                AuthScheme::Bearer { token: row.secret.clone().ok_or_else(|| missing("secret"))? }
            }
            "basic" => AuthScheme::Basic {
                username: row.username.clone().ok_or_else(|| missing("username"))?,
                secret: row.secret.clone().ok_or_else(|| missing("secret"))?,
            },
            other => {
                return Err(ToolgateError::validation(format!(
                    "Credential '{}' has unknown auth type '{}'",
                    row.id, other
                )))
            }
        };

        Ok(Self {
            id: CredentialId::from_string(row.id),
            tenant_id: TenantId::from_string(row.tenant_id),
            scheme,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Database row structure for API definitions
#[derive(Debug, Clone, FromRow)]
struct ApiDefinitionRow {
    pub id: String,
    pub tenant_id: String,
    pub credential_id: Option<String>,
    pub tool_name: Option<String>,
    pub description: Option<String>,
    pub http_method: String,
    pub url_template: String,
    pub parameters: String,
    pub payload_template: Option<String>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Configured API definition data
#[derive(Debug, Clone)]
pub struct ApiDefinitionData {
    pub id: ApiDefinitionId,
    pub tenant_id: TenantId,
    pub credential_id: Option<CredentialId>,
    pub tool_name: Option<String>,
    pub description: Option<String>,
    pub http_method: String,
    pub url_template: String,
    pub parameters: BTreeMap<String, ParameterSpec>,
    pub payload_template: Option<serde_json::Value>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ApiDefinitionRow> for ApiDefinitionData {
    type Error = ToolgateError;

    fn try_from(row: ApiDefinitionRow) -> Result<Self> {
        let parameters: BTreeMap<String, ParameterSpec> = serde_json::from_str(&row.parameters)
            .map_err(|e| {
                ToolgateError::validation(format!(
                    "API definition '{}' has an invalid parameter map: {}",
                    row.id, e
                ))
            })?;

        let payload_template = row
            .payload_template
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| {
                ToolgateError::validation(format!(
                    "API definition '{}' has an invalid payload template: {}",
                    row.id, e
                ))
            })?;

        Ok(Self {
            id: ApiDefinitionId::from_string(row.id),
            tenant_id: TenantId::from_string(row.tenant_id),
            credential_id: row.credential_id.map(CredentialId::from_string),
            tool_name: row.tool_name,
            description: row.description,
            http_method: row.http_method,
            url_template: row.url_template,
            parameters,
            payload_template,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything the gateway needs to serve one tenant, read fresh per request.
///
/// The gateway never holds a bundle across requests: configuration edits
/// take effect on the next call, with no cache to invalidate.
#[derive(Debug, Clone)]
pub struct TenantBundle {
    pub tenant: TenantData,
    pub api_definitions: Vec<ApiDefinitionData>,
    pub credentials: Vec<CredentialData>,
}

impl TenantBundle {
    /// Resolve the credential an API definition references, if any
    pub fn credential_for(&self, definition: &ApiDefinitionData) -> Option<&CredentialData> {
        let wanted = definition.credential_id.as_ref()?;
        self.credentials.iter().find(|c| &c.id == wanted)
    }
}

/// Directory listing entry for one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub slug: String,
    pub name: String,
    pub tools_count: i64,
}

/// Read-only lookup contract the gateway consumes storage through.
///
/// `get_tenant` accepts a tenant id or slug. Implementations must not cache:
/// every call reflects the stored state at call time.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn get_tenant(&self, id_or_slug: &str) -> Result<TenantBundle>;
    async fn list_tenants(&self) -> Result<Vec<TenantSummary>>;
}

/// Request payload for creating a tenant
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    pub slug: String,
    pub name: String,
}

/// Request payload for creating a credential
#[derive(Debug, Clone)]
pub struct CreateCredentialRequest {
    pub tenant_id: TenantId,
    pub scheme: AuthScheme,
}

/// Request payload for creating an API definition
#[derive(Debug, Clone)]
pub struct CreateApiDefinitionRequest {
    pub tenant_id: TenantId,
    pub credential_id: Option<CredentialId>,
    pub tool_name: Option<String>,
    pub description: Option<String>,
    pub http_method: String,
    pub url_template: String,
    pub parameters: BTreeMap<String, ParameterSpec>,
    pub payload_template: Option<serde_json::Value>,
}

/// SQLx-backed tenant directory.
///
/// The write methods exist for administrative seeding and tests; the
/// gateway itself only ever reads.
#[derive(Clone)]
pub struct SqlxTenantDirectory {
    pool: DbPool,
}

impl SqlxTenantDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn create_tenant(&self, request: CreateTenantRequest) -> Result<TenantData> {
        let id = TenantId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO tenants (id, slug, name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(&request.slug)
        .bind(&request.name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to create tenant"))?;

        Ok(TenantData {
            id,
            slug: request.slug,
            name: request.name,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn create_credential(
        &self,
        request: CreateCredentialRequest,
    ) -> Result<CredentialData> {
        let id = CredentialId::new();
        let now = Utc::now();

        let (header_name, username, secret) = match &request.scheme {
            AuthScheme::None => (None, None, None),
            AuthScheme::ApiKey { header, value } => {
                (Some(header.clone()), None, Some(value.clone()))
            }
            AuthScheme::Bearer { token } => (None, None, Some(token.clone())),
            AuthScheme::Basic { username, secret } => {
                (None, Some(username.clone()), Some(secret.clone()))
            }
        };

        sqlx::query(
            "INSERT INTO credentials
                (id, tenant_id, auth_type, header_name, username, secret, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(request.tenant_id.as_str())
        .bind(request.scheme.kind())
        .bind(&header_name)
        .bind(&username)
        .bind(&secret)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to create credential"))?;

        Ok(CredentialData {
            id,
            tenant_id: request.tenant_id,
            scheme: request.scheme,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn create_api_definition(
        &self,
        request: CreateApiDefinitionRequest,
    ) -> Result<ApiDefinitionData> {
        let id = ApiDefinitionId::new();
        let now = Utc::now();

        let parameters_json = serde_json::to_string(&request.parameters)?;
        let payload_json =
            request.payload_template.as_ref().map(serde_json::to_string).transpose()?;

        let (next_position,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM api_definitions WHERE tenant_id = ?",
        )
        .bind(request.tenant_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to determine definition position"))?;

        sqlx::query(
            "INSERT INTO api_definitions
                (id, tenant_id, credential_id, tool_name, description, http_method,
                 url_template, parameters, payload_template, position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(request.tenant_id.as_str())
        .bind(request.credential_id.as_ref().map(|c| c.as_str().to_string()))
        .bind(&request.tool_name)
        .bind(&request.description)
        .bind(&request.http_method)
        .bind(&request.url_template)
        .bind(&parameters_json)
        .bind(&payload_json)
        .bind(next_position)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to create API definition"))?;

        Ok(ApiDefinitionData {
            id,
            tenant_id: request.tenant_id,
            credential_id: request.credential_id,
            tool_name: request.tool_name,
            description: request.description,
            http_method: request.http_method,
            url_template: request.url_template,
            parameters: request.parameters,
            payload_template: request.payload_template,
            position: next_position,
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl TenantDirectory for SqlxTenantDirectory {
    async fn get_tenant(&self, id_or_slug: &str) -> Result<TenantBundle> {
        let tenant_row: Option<TenantRow> = sqlx::query_as(
            "SELECT id, slug, name, created_at, updated_at
             FROM tenants WHERE id = ? OR slug = ?",
        )
        .bind(id_or_slug)
        .bind(id_or_slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to load tenant"))?;

        let tenant: TenantData =
            tenant_row.ok_or_else(|| ToolgateError::not_found("tenant", id_or_slug))?.into();

        let definition_rows: Vec<ApiDefinitionRow> = sqlx::query_as(
            "SELECT id, tenant_id, credential_id, tool_name, description, http_method,
                    url_template, parameters, payload_template, position, created_at, updated_at
             FROM api_definitions WHERE tenant_id = ?
             ORDER BY position ASC, created_at ASC",
        )
        .bind(tenant.id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to load API definitions"))?;

        let credential_rows: Vec<CredentialRow> = sqlx::query_as(
            "SELECT id, tenant_id, auth_type, header_name, username, secret,
                    created_at, updated_at
             FROM credentials WHERE tenant_id = ?",
        )
        .bind(tenant.id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to load credentials"))?;

        let api_definitions = definition_rows
            .into_iter()
            .map(ApiDefinitionData::try_from)
            .collect::<Result<Vec<_>>>()?;
        let credentials = credential_rows
            .into_iter()
            .map(CredentialData::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(TenantBundle { tenant, api_definitions, credentials })
    }

    async fn list_tenants(&self) -> Result<Vec<TenantSummary>> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            "SELECT t.id, t.slug, t.name, COUNT(a.id)
             FROM tenants t
             LEFT JOIN api_definitions a ON a.tenant_id = t.id
             GROUP BY t.id, t.slug, t.name
             ORDER BY t.slug ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ToolgateError::database(e, "Failed to list tenants"))?;

        Ok(rows
            .into_iter()
            .map(|(id, slug, name, tools_count)| TenantSummary {
                id: TenantId::from_string(id),
                slug,
                name,
                tools_count,
            })
            .collect())
    }
}
