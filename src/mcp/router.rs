//! MCP method router. Routes by method name and delegates to the tool adapter.

use serde_json::Value;

use crate::mcp::types::{CallToolParams, CallToolResult, DEFAULT_PROTOCOL_VERSION, SERVER_NAME};
use crate::tools::{ToolAdapter, ToolInvocation};
use crate::types::{Error, Result};

/// Route a JSON-RPC request to its handler.
pub async fn route_request(
    adapter: &ToolAdapter,
    method: &str,
    params: Option<Value>,
) -> Result<Value> {
    match method {
        "initialize" => Ok(initialize(params.as_ref())),
        "ping" => Ok(serde_json::json!({})),
        "tools/list" => Ok(serde_json::json!({ "tools": adapter.list_tools() })),
        "tools/call" => {
            let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|e| Error::validation(format!("Invalid tools/call params: {}", e)))?;

            let invocation =
                ToolInvocation::new(params.name, params.arguments.unwrap_or(Value::Null));
            let result = CallToolResult::from(adapter.call_tool(invocation).await);
            Ok(serde_json::to_value(result)?)
        }
        _ => Err(Error::not_found(format!("Method not found: {}", method))),
    }
}

fn initialize(params: Option<&Value>) -> Value {
    let version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    serde_json::json!({
        "protocolVersion": version,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}
