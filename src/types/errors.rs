//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC: invalid JSON was received.
pub const RPC_PARSE_ERROR: i64 = -32700;
/// JSON-RPC: the message is not a valid request object.
pub const RPC_INVALID_REQUEST: i64 = -32600;
/// JSON-RPC: the method does not exist.
pub const RPC_METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC: invalid method parameters.
pub const RPC_INVALID_PARAMS: i64 = -32602;
/// JSON-RPC: internal error.
pub const RPC_INTERNAL_ERROR: i64 = -32603;

/// Main error enum for the market-query server.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid tool arguments or request parameters (JSON-RPC INVALID_PARAMS).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown method or resource (JSON-RPC METHOD_NOT_FOUND).
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing or invalid configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream API answered with a failure or could not be reached.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Upstream call or agent run exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Cancelled by the client or by shutdown.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Failure reported by the external agent runtime.
    #[error("{0}")]
    Agent(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert to a JSON-RPC error code.
    pub fn to_rpc_code(&self) -> i64 {
        match self {
            Error::Validation(_) => RPC_INVALID_PARAMS,
            Error::NotFound(_) => RPC_METHOD_NOT_FOUND,
            Error::Serialization(_) => RPC_PARSE_ERROR,
            Error::Config(_)
            | Error::Upstream(_)
            | Error::Timeout(_)
            | Error::Cancelled(_)
            | Error::Agent(_)
            | Error::Internal(_)
            | Error::Io(_) => RPC_INTERNAL_ERROR,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

// The request URL carries the API key, so it is stripped before the error is
// rendered anywhere.
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::timeout(err.without_url().to_string())
        } else {
            Error::upstream(err.without_url().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_codes() {
        assert_eq!(Error::validation("x").to_rpc_code(), RPC_INVALID_PARAMS);
        assert_eq!(Error::not_found("x").to_rpc_code(), RPC_METHOD_NOT_FOUND);
        assert_eq!(Error::upstream("x").to_rpc_code(), RPC_INTERNAL_ERROR);
    }

    #[test]
    fn test_agent_error_displays_bare_message() {
        assert_eq!(Error::agent("model overloaded").to_string(), "model overloaded");
        assert_eq!(
            Error::validation("missing field `ticker`").to_string(),
            "validation error: missing field `ticker`"
        );
    }
}
