//! MCP (Model Context Protocol) Gateway
//!
//! The protocol core: tool derivation from tenant configuration, the
//! JSON-RPC dispatcher, the templated downstream executor, and the three
//! transport adapters (synchronous HTTP, SSE push, stdio bridge).

pub mod bridge;
pub mod error;
pub mod executor;
pub mod handler;
pub mod http;
pub mod ide;
pub mod protocol;
pub mod sse;
pub mod tools;

pub use bridge::StdioBridge;
pub use error::McpError;
pub use executor::ToolExecutor;
pub use handler::{McpHandler, SERVER_NAME};
pub use http::{gateway_router, GatewayState};
pub use ide::{build_ide_config, directory_listing, DirectoryEntry, IdeTransport};
pub use protocol::*;
pub use tools::{derive_tool, derive_tools};
