//! # Toolgate
//!
//! A multi-tenant protocol gateway that exposes each tenant's (merchant's)
//! configured REST APIs as MCP tools consumable by AI agents and IDE
//! integrations.
//!
//! ## Architecture
//!
//! ```text
//! agent / IDE → (stdio bridge | direct HTTP) → JSON-RPC dispatcher
//!                                                   ↓
//!                                         tool deriver + executor
//!                                                   ↓
//!                                         downstream tenant API
//! ```
//!
//! Tenant configuration (API definitions and downstream credentials) lives
//! in the storage layer and is re-read on every request: the gateway keeps
//! no long-lived copies, so configuration edits apply on the next call with
//! no cache to invalidate. The SSE transport is a push-only discovery and
//! liveness channel; tool execution happens on the synchronous RPC
//! endpoint.

pub mod config;
pub mod domain;
pub mod errors;
pub mod mcp;
pub mod observability;
pub mod storage;

pub use config::Config;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
