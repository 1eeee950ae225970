//! Core types shared across the crate.
//!
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for upstream, rate limiting, server and chat

mod config;
mod errors;

pub use config::{
    ChatConfig, Config, ObservabilityConfig, RateLimitConfig, ServerConfig, UpstreamConfig,
    DEFAULT_BASE_URL,
};
pub use errors::{
    Error, Result, RPC_INTERNAL_ERROR, RPC_INVALID_PARAMS, RPC_INVALID_REQUEST,
    RPC_METHOD_NOT_FOUND, RPC_PARSE_ERROR,
};
