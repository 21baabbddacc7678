//! # Storage Layer
//!
//! SQLite-backed persistence for tenant configuration. The protocol
//! gateway reads this layer only through the [`TenantDirectory`] trait and
//! re-reads per request; nothing here is cached by callers.

pub mod migrations;
pub mod pool;
pub mod repository;
pub mod test_helpers;

pub use migrations::run_migrations;
pub use pool::{create_pool, DbPool};
pub use repository::{
    ApiDefinitionData, CreateApiDefinitionRequest, CreateCredentialRequest, CreateTenantRequest,
    CredentialData, SqlxTenantDirectory, TenantBundle, TenantData, TenantDirectory, TenantSummary,
};
