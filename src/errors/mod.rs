//! # Error Handling
//!
//! Centralized error types for the Toolgate gateway. Protocol-level
//! JSON-RPC errors live in [`crate::mcp::error`]; this module covers
//! everything beneath the protocol layer.

mod types;

pub use types::{Result, ToolgateError};

/// Convenience alias used throughout the crate
pub type Error = ToolgateError;
