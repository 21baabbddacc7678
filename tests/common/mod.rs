//! Shared test harness: a migrated in-memory database, a seeded tenant,
//! and helpers to stand the gateway up in-process or on a real port.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use toolgate::domain::{AuthScheme, ParameterSpec};
use toolgate::mcp::{gateway_router, GatewayState, ToolExecutor};
use toolgate::storage::test_helpers::TestDatabase;
use toolgate::storage::{
    CreateApiDefinitionRequest, CreateCredentialRequest, CreateTenantRequest, CredentialData,
    SqlxTenantDirectory, TenantData,
};

pub struct Harness {
    pub db: TestDatabase,
    pub directory: Arc<SqlxTenantDirectory>,
    pub tenant: TenantData,
}

/// A fresh gateway backed by one seeded tenant (`acme`)
pub async fn harness() -> Harness {
    let db = TestDatabase::new().await;
    let directory = SqlxTenantDirectory::new(db.pool.clone());
    let tenant = directory
        .create_tenant(CreateTenantRequest {
            slug: "acme".to_string(),
            name: "Acme Storefront".to_string(),
        })
        .await
        .expect("create tenant");

    Harness { db, directory: Arc::new(directory), tenant }
}

impl Harness {
    pub fn state(&self) -> GatewayState {
        GatewayState::new(
            self.directory.clone(),
            ToolExecutor::new(Duration::from_secs(10)),
            Duration::from_millis(200),
        )
    }

    pub async fn add_credential(&self, scheme: AuthScheme) -> CredentialData {
        self.directory
            .create_credential(CreateCredentialRequest {
                tenant_id: self.tenant.id.clone(),
                scheme,
            })
            .await
            .expect("create credential")
    }

    pub async fn add_definition(&self, request: DefinitionSpec<'_>) {
        self.directory
            .create_api_definition(CreateApiDefinitionRequest {
                tenant_id: self.tenant.id.clone(),
                credential_id: request.credential.map(|c| c.id.clone()),
                tool_name: Some(request.name.to_string()),
                description: request.description.map(|d| d.to_string()),
                http_method: request.method.to_string(),
                url_template: request.url.to_string(),
                parameters: request.parameters,
                payload_template: request.payload,
            })
            .await
            .expect("create definition");
    }

    /// Serve the gateway on an ephemeral local port, returning its base URL
    pub async fn spawn_http(&self) -> (String, tokio::task::JoinHandle<()>) {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let router = gateway_router(self.state());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                eprintln!("test gateway server failed: {}", e);
            }
        });

        (format!("http://{}", addr), handle)
    }
}

pub struct DefinitionSpec<'a> {
    pub name: &'a str,
    pub method: &'a str,
    pub url: &'a str,
    pub description: Option<&'a str>,
    pub parameters: BTreeMap<String, ParameterSpec>,
    pub payload: Option<serde_json::Value>,
    pub credential: Option<&'a CredentialData>,
}

impl<'a> DefinitionSpec<'a> {
    pub fn get(name: &'a str, url: &'a str) -> Self {
        Self {
            name,
            method: "GET",
            url,
            description: None,
            parameters: BTreeMap::new(),
            payload: None,
            credential: None,
        }
    }
}
