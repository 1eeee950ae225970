//! Client/server message shapes.

use serde::{Deserialize, Serialize};

/// Message sent by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientQuery {
    #[serde(default)]
    pub query: String,
}

/// Final answer payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Agent output (markdown).
    pub output: String,
    /// Distinct tool names the agent called, sorted.
    pub tools_used: Vec<String>,
}

/// Message sent to the browser, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { message: String },
    Processing { message: String },
    Response { data: ResponseData },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            serde_json::to_value(ServerMessage::error("Invalid JSON format")).unwrap(),
            json!({"type": "error", "message": "Invalid JSON format"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Response {
                data: ResponseData {
                    output: "AAPL closed at 150".into(),
                    tools_used: vec!["get_stock_price".into()],
                },
            })
            .unwrap(),
            json!({
                "type": "response",
                "data": {"output": "AAPL closed at 150", "tools_used": ["get_stock_price"]}
            })
        );
    }

    #[test]
    fn test_query_defaults_to_empty() {
        let query: ClientQuery = serde_json::from_str("{}").unwrap();
        assert!(query.query.is_empty());
    }
}
