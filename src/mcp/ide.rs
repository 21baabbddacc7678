//! IDE Configuration Artifacts
//!
//! Produces the configuration mapping IDE-style hosts consume to register
//! one tool server per tenant: either a stdio-bridge launch descriptor or a
//! direct streaming-endpoint descriptor. Built from the directory listing
//! only; nothing here is consumed by the gateway at runtime.

use crate::errors::Result;
use crate::storage::{TenantDirectory, TenantSummary};
use serde::{Deserialize, Serialize};

/// Transport an IDE entry should use to reach the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IdeTransport {
    /// Launch the local stdio bridge process per tenant
    Stdio,
    /// Connect directly to the streaming endpoint
    Sse,
}

/// One row of the server directory: a tenant plus where its MCP endpoint
/// lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub tools_count: i64,
    pub mcp_base_url: String,
}

fn mcp_base_url(base_url: &str, slug: &str) -> String {
    format!("{}/mcp/{}", base_url.trim_end_matches('/'), slug)
}

/// List every tenant with its MCP base URL
pub async fn directory_listing(
    directory: &dyn TenantDirectory,
    base_url: &str,
) -> Result<Vec<DirectoryEntry>> {
    let summaries = directory.list_tenants().await?;
    Ok(summaries
        .into_iter()
        .map(|summary| DirectoryEntry {
            mcp_base_url: mcp_base_url(base_url, &summary.slug),
            id: summary.id.into_string(),
            slug: summary.slug,
            name: summary.name,
            tools_count: summary.tools_count,
        })
        .collect())
}

/// Build the `mcpServers` configuration object, one entry per tenant keyed
/// by slug
pub async fn build_ide_config(
    directory: &dyn TenantDirectory,
    base_url: &str,
    transport: IdeTransport,
) -> Result<serde_json::Value> {
    let summaries = directory.list_tenants().await?;

    let mut servers = serde_json::Map::new();
    for summary in summaries {
        let entry = match transport {
            IdeTransport::Stdio => stdio_server_entry(&summary, base_url),
            IdeTransport::Sse => sse_server_entry(&summary, base_url),
        };
        servers.insert(format!("toolgate-{}", summary.slug), entry);
    }

    Ok(serde_json::json!({ "mcpServers": servers }))
}

/// Launch descriptor for the local stdio bridge process
fn stdio_server_entry(summary: &TenantSummary, base_url: &str) -> serde_json::Value {
    serde_json::json!({
        "command": "toolgate-stdio",
        "args": ["--tenant", summary.slug, "--endpoint", base_url],
        "metadata": {
            "name": summary.name,
            "toolsCount": summary.tools_count,
        }
    })
}

/// Direct streaming-endpoint descriptor
fn sse_server_entry(summary: &TenantSummary, base_url: &str) -> serde_json::Value {
    serde_json::json!({
        "url": format!("{}/sse", mcp_base_url(base_url, &summary.slug)),
        "metadata": {
            "name": summary.name,
            "toolsCount": summary.tools_count,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;
    use crate::storage::{CreateTenantRequest, SqlxTenantDirectory};

    async fn seeded_directory() -> (TestDatabase, SqlxTenantDirectory) {
        let db = TestDatabase::new().await;
        let directory = SqlxTenantDirectory::new(db.pool.clone());
        for (slug, name) in [("acme", "Acme Storefront"), ("globex", "Globex")] {
            directory
                .create_tenant(CreateTenantRequest {
                    slug: slug.to_string(),
                    name: name.to_string(),
                })
                .await
                .expect("tenant");
        }
        (db, directory)
    }

    #[tokio::test]
    async fn test_directory_listing_carries_base_urls() {
        let (_db, directory) = seeded_directory().await;
        let entries =
            directory_listing(&directory, "http://gateway.local:8080/").await.expect("listing");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].slug, "acme");
        assert_eq!(entries[0].mcp_base_url, "http://gateway.local:8080/mcp/acme");
        assert_eq!(entries[0].tools_count, 0);
    }

    #[tokio::test]
    async fn test_stdio_config_has_one_entry_per_tenant() {
        let (_db, directory) = seeded_directory().await;
        let config = build_ide_config(&directory, "http://gateway.local:8080", IdeTransport::Stdio)
            .await
            .expect("config");

        let servers = config["mcpServers"].as_object().expect("servers");
        assert_eq!(servers.len(), 2);

        let acme = &servers["toolgate-acme"];
        assert_eq!(acme["command"], "toolgate-stdio");
        assert_eq!(
            acme["args"],
            serde_json::json!(["--tenant", "acme", "--endpoint", "http://gateway.local:8080"])
        );
    }

    #[tokio::test]
    async fn test_sse_config_points_at_streaming_endpoint() {
        let (_db, directory) = seeded_directory().await;
        let config = build_ide_config(&directory, "http://gateway.local:8080", IdeTransport::Sse)
            .await
            .expect("config");

        assert_eq!(
            config["mcpServers"]["toolgate-globex"]["url"],
            "http://gateway.local:8080/mcp/globex/sse"
        );
    }
}
