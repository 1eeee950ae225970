//! MCP stdio transport layer.
//!
//! Newline-delimited JSON-RPC 2.0 over stdin/stdout, exposing the tool
//! adapter's `tools/list` and `tools/call`.

pub mod codec;
pub mod router;
pub mod server;
pub mod types;

pub use server::McpServer;
