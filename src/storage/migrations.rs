//! # Database Migration Management
//!
//! Schema evolution using SQL migrations embedded in the binary and
//! executed automatically on application startup when auto_migrate is
//! enabled. Applied versions are tracked in a `schema_migrations` table so
//! reruns are no-ops.

use crate::errors::{Result, ToolgateError};
use crate::storage::DbPool;
use tracing::{debug, info};

/// Embedded migrations, applied in order
const MIGRATIONS: &[(i64, &str, &str)] =
    &[(1, "initial_schema", include_str!("../../migrations/0001_initial_schema.sql"))];

async fn ensure_migrations_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            installed_on TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| ToolgateError::database(e, "Failed to create schema_migrations table"))?;
    Ok(())
}

async fn applied_versions(pool: &DbPool) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT version FROM schema_migrations ORDER BY version")
            .fetch_all(pool)
            .await
            .map_err(|e| ToolgateError::database(e, "Failed to read applied migrations"))?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

/// Run all pending migrations against the given pool
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    ensure_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;

    for (version, description, sql) in MIGRATIONS {
        if applied.contains(version) {
            debug!(version, description, "Migration already applied, skipping");
            continue;
        }

        info!(version, description, "Applying database migration");

        sqlx::raw_sql(sql).execute(pool).await.map_err(|e| {
            ToolgateError::database(e, format!("Failed to apply migration {}", version))
        })?;

        sqlx::query(
            "INSERT INTO schema_migrations (version, description, installed_on) VALUES (?, ?, ?)",
        )
        .bind(*version)
        .bind(*description)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .map_err(|e| {
            ToolgateError::database(e, format!("Failed to record migration {}", version))
        })?;
    }

    Ok(())
}
