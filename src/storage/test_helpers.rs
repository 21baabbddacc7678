//! Test database utilities.
//!
//! Provides an in-memory SQLite database with all migrations applied,
//! giving full isolation between tests. Kept out of `#[cfg(test)]` so the
//! integration suites under `tests/` can use it as well.

use crate::storage::{migrations, DbPool};

/// A fully migrated in-memory test database.
///
/// Keep this struct alive for the duration of the test: dropping the pool
/// drops the in-memory database with it.
pub struct TestDatabase {
    pub pool: DbPool,
}

impl TestDatabase {
    /// Create a fresh in-memory database with the schema applied.
    ///
    /// A single connection keeps every query on the same in-memory
    /// database (SQLite gives each physical connection its own `:memory:`
    /// instance).
    pub async fn new() -> Self {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory sqlite database");

        migrations::run_migrations(&pool).await.expect("failed to run migrations");

        Self { pool }
    }
}
