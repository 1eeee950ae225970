//! Tool adapter: runs catalog tools against the upstream API.
//!
//! `call_tool` never fails: unknown tools, bad arguments and upstream failures
//! all come back as text so the calling agent can react in-band.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::tools::catalog::{ToolCatalog, ToolDescriptor};
use crate::tools::client::PolygonClient;
use crate::tools::stocks::stock_catalog;
use crate::types::{Result, UpstreamConfig};

/// One tool call requested by the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    #[serde(rename = "name")]
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Text produced by a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub text: String,
    /// Set when the text is an `Error: …` report.
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        Self {
            text: format!("Error: {err}"),
            is_error: true,
        }
    }
}

/// Catalog plus upstream client. Shared read-only across concurrent calls.
#[derive(Debug)]
pub struct ToolAdapter {
    catalog: ToolCatalog,
    client: PolygonClient,
}

impl ToolAdapter {
    /// Build the stock tool adapter. Fails without an API key.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = PolygonClient::new(config)?;
        let catalog = stock_catalog()?;
        tracing::info!(tools = catalog.len(), base_url = %config.base_url, "tool adapter ready");
        Ok(Self::with_parts(catalog, client))
    }

    pub fn with_parts(catalog: ToolCatalog, client: PolygonClient) -> Self {
        Self { catalog, client }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// The static catalog, in published order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.catalog.descriptors()
    }

    /// Execute one tool call: at most one upstream GET, never an error.
    pub async fn call_tool(&self, invocation: ToolInvocation) -> ToolResult {
        let name = invocation.tool_name;
        if !self.catalog.has_tool(&name) {
            tracing::warn!(tool = %name, "unknown tool requested");
            return ToolResult::text(format!("Unknown tool: {name}"));
        }

        let request = match self.catalog.prepare(&name, invocation.arguments) {
            Ok(request) => request,
            Err(e) => {
                tracing::info!(tool = %name, error = %e, "rejected tool arguments");
                return ToolResult::error(e);
            }
        };

        let started = Instant::now();
        let outcome = self.client.get_json(&request).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome.and_then(|body| Ok(serde_json::to_string_pretty(&body)?)) {
            Ok(text) => {
                tracing::info!(tool = %name, path = %request.path(), latency_ms, "tool call succeeded");
                ToolResult::text(text)
            }
            Err(e) => {
                tracing::warn!(tool = %name, path = %request.path(), latency_ms, error = %e, "tool call failed");
                ToolResult::error(e)
            }
        }
    }
}
