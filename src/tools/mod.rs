//! Tool infrastructure: catalog, typed request builders, upstream client and adapter.
//!
//! The catalog owns tool metadata and argument validation; `stocks` defines the
//! fifteen Polygon tools; the adapter runs a call end to end and always returns text.

pub mod adapter;
pub mod catalog;
pub mod client;
pub mod request;
pub mod stocks;

pub use adapter::{ToolAdapter, ToolInvocation, ToolResult};
pub use catalog::{ParamDef, ParamType, ToolCatalog, ToolDescriptor, ToolEntry, ToolHandler};
pub use client::PolygonClient;
pub use request::ApiRequest;
pub use stocks::{stock_catalog, stock_tools};
