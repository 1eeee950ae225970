//! # Market Query
//!
//! Stock-market tooling for an LLM agent, backed by the Polygon.io REST API:
//! - A catalog of fifteen read-only stock tools with JSON-Schema argument contracts
//! - A tool adapter that validates arguments, calls Polygon, and renders results as text
//! - An MCP server speaking newline-delimited JSON-RPC over stdio
//! - A sliding-window rate limiter shared by chat sessions
//! - The chat session gate that sits between a client connection and the agent
//!
//! ## Architecture
//!
//! ```text
//!   MCP client ──stdio──▶ McpServer ──▶ ToolAdapter ──HTTP──▶ Polygon.io
//!                                          │
//!   chat client ──▶ ChatSession ──▶ AgentRuntime (external) ──▶ tools
//!                      │
//!                 RateLimiter (shared)
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod chat;
pub mod mcp;
pub mod rate_limiter;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;
pub(crate) mod validation;

pub use types::{Config, Error, Result};
