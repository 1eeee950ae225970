//! Tool catalog: typed metadata, schema validation, dispatch by name.
//!
//! Every entry pairs its published metadata with a request builder that turns a
//! validated argument object into exactly one upstream request.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::tools::request::ApiRequest;
use crate::types::{Error, Result};

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
}

impl ParamType {
    /// JSON Schema type keyword.
    pub fn schema_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Value filled in when the caller omits this parameter.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".into(), Value::from(self.param_type.schema_type()));
        prop.insert("description".into(), Value::from(self.description.as_str()));
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        Value::Object(prop)
    }
}

// =============================================================================
// Tool entry
// =============================================================================

/// Published tool metadata.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolEntry {
    pub fn new(name: &str, description: &str, parameters: Vec<ParamDef>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Names of the required parameters, in declaration order.
    pub fn required_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// JSON Schema object describing the arguments.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": self.required_names(),
        })
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }
}

/// Tool as advertised to the agent runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

// =============================================================================
// Handler
// =============================================================================

type BuildFn = Box<dyn Fn(Value) -> Result<ApiRequest> + Send + Sync>;

/// Tool metadata plus its strongly-typed request builder.
pub struct ToolHandler {
    entry: ToolEntry,
    build: BuildFn,
}

impl ToolHandler {
    /// Create a handler whose arguments deserialize into `A`.
    pub fn new<A, F>(entry: ToolEntry, build: F) -> Self
    where
        A: DeserializeOwned,
        F: Fn(A) -> ApiRequest + Send + Sync + 'static,
    {
        Self {
            entry,
            build: Box::new(move |args| {
                let typed: A = serde_json::from_value(args)
                    .map_err(|e| Error::validation(format!("invalid arguments: {e}")))?;
                Ok(build(typed))
            }),
        }
    }

    pub fn entry(&self) -> &ToolEntry {
        &self.entry
    }

    /// Build the upstream request from an already-validated argument object.
    pub fn build_request(&self, args: Value) -> Result<ApiRequest> {
        (self.build)(args)
    }
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolHandler")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

struct Registered {
    handler: ToolHandler,
    validator: jsonschema::Validator,
}

// =============================================================================
// Tool catalog
// =============================================================================

/// Ordered tool catalog. Read-only once built.
#[derive(Default)]
pub struct ToolCatalog {
    tools: Vec<Registered>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Names must be unique and schemas well-formed.
    pub fn register(&mut self, handler: ToolHandler) -> Result<()> {
        let entry = handler.entry();
        if entry.name.is_empty() {
            return Err(Error::validation("Tool name cannot be empty"));
        }
        if self.index.contains_key(&entry.name) {
            return Err(Error::validation(format!("Duplicate tool name: {}", entry.name)));
        }

        let mut seen = std::collections::HashSet::new();
        for param in &entry.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(Error::validation(format!(
                    "Tool {}: duplicate parameter {}",
                    entry.name, param.name
                )));
            }
            if param.required && param.default.is_some() {
                return Err(Error::validation(format!(
                    "Tool {}: required parameter {} cannot have a default",
                    entry.name, param.name
                )));
            }
            if let Some(default) = &param.default {
                if !param.param_type.accepts(default) {
                    return Err(Error::validation(format!(
                        "Tool {}: default for {} is not a {}",
                        entry.name,
                        param.name,
                        param.param_type.schema_type()
                    )));
                }
            }
        }

        let validator = jsonschema::validator_for(&entry.input_schema()).map_err(|e| {
            Error::validation(format!("Tool {}: invalid input schema: {}", entry.name, e))
        })?;

        self.index.insert(entry.name.clone(), self.tools.len());
        self.tools.push(Registered { handler, validator });
        Ok(())
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<&ToolHandler> {
        self.index.get(name).map(|&i| &self.tools[i].handler)
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entries in registration order.
    pub fn list_entries(&self) -> Vec<&ToolEntry> {
        self.tools.iter().map(|r| r.handler.entry()).collect()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|r| r.handler.entry().descriptor()).collect()
    }

    /// Validate arguments against a tool's input schema.
    ///
    /// Returns a list of validation errors (empty = valid).
    pub fn validate_arguments(&self, name: &str, args: &Value) -> Result<Vec<String>> {
        let registered = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", name)))?;

        Ok(registered
            .validator
            .iter_errors(args)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect())
    }

    /// Fill in default values for missing optional parameters.
    pub fn fill_defaults(&self, name: &str, args: &mut Value) -> Result<()> {
        let handler = self
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", name)))?;

        if let Some(map) = args.as_object_mut() {
            for param in &handler.entry().parameters {
                if let Some(default) = &param.default {
                    if map.get(&param.name).map_or(true, Value::is_null) {
                        map.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate, apply defaults, and build the upstream request for one call.
    ///
    /// A missing (`null`) argument bag is treated as an empty object.
    pub fn prepare(&self, name: &str, args: Value) -> Result<ApiRequest> {
        let handler = self
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", name)))?;

        let mut args = match args {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => args,
            _ => return Err(Error::validation("Arguments must be a JSON object")),
        };

        // Explicit nulls mean "not supplied".
        if let Some(map) = args.as_object_mut() {
            map.retain(|_, v| !v.is_null());
        }

        let errors = self.validate_arguments(name, &args)?;
        if !errors.is_empty() {
            return Err(Error::validation(errors.join("; ")));
        }

        self.fill_defaults(name, &mut args)?;
        handler.build_request(args)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.list_entries())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct LookupArgs {
        query: String,
        max_results: u32,
        #[serde(default)]
        exact: Option<bool>,
    }

    fn sample_handler() -> ToolHandler {
        let entry = ToolEntry::new(
            "lookup",
            "Look something up",
            vec![
                ParamDef::required("query", ParamType::String, "Search query"),
                ParamDef::optional("max_results", ParamType::Integer, "Maximum results")
                    .with_default(10),
                ParamDef::optional("exact", ParamType::Boolean, "Exact match only"),
            ],
        );
        ToolHandler::new(entry, |args: LookupArgs| {
            ApiRequest::new(["v1", "lookup"])
                .query("q", args.query)
                .query("limit", args.max_results)
                .query_opt("exact", args.exact)
        })
    }

    fn catalog() -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_handler()).unwrap();
        catalog
    }

    #[test]
    fn test_register_and_get() {
        let catalog = catalog();
        assert!(catalog.has_tool("lookup"));
        assert!(!catalog.has_tool("nonexistent"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("lookup").unwrap().entry().description, "Look something up");
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut catalog = catalog();
        let err = catalog.register(sample_handler()).unwrap_err();
        assert!(err.to_string().contains("Duplicate tool name: lookup"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_register_empty_name_fails() {
        let mut catalog = ToolCatalog::new();
        let handler = ToolHandler::new(ToolEntry::new("", "nothing", vec![]), |_: Value| {
            ApiRequest::new(["x"])
        });
        assert!(catalog.register(handler).is_err());
    }

    #[test]
    fn test_register_rejects_bad_defaults() {
        let mut catalog = ToolCatalog::new();
        let entry = ToolEntry::new(
            "bad",
            "bad default",
            vec![ParamDef::optional("limit", ParamType::Integer, "n").with_default("ten")],
        );
        let handler = ToolHandler::new(entry, |_: Value| ApiRequest::new(["x"]));
        assert!(catalog.register(handler).is_err());

        let mut required_with_default =
            ParamDef::required("ticker", ParamType::String, "t");
        required_with_default.default = Some(Value::from("AAPL"));
        let entry = ToolEntry::new("bad2", "required default", vec![required_with_default]);
        let handler = ToolHandler::new(entry, |_: Value| ApiRequest::new(["x"]));
        assert!(catalog.register(handler).is_err());
    }

    #[test]
    fn test_input_schema_shape() {
        let schema = catalog().get("lookup").unwrap().entry().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["query"]));
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["properties"]["max_results"]["type"], "integer");
        assert_eq!(schema["properties"]["max_results"]["default"], 10);
        assert!(schema["properties"]["exact"].get("default").is_none());
    }

    #[test]
    fn test_validate_arguments_valid() {
        let errors = catalog()
            .validate_arguments("lookup", &serde_json::json!({"query": "rust"}))
            .unwrap();
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_validate_arguments_missing_required() {
        let errors = catalog()
            .validate_arguments("lookup", &serde_json::json!({}))
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("query"));
    }

    #[test]
    fn test_validate_arguments_wrong_type() {
        let errors = catalog()
            .validate_arguments("lookup", &serde_json::json!({"query": 42}))
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("/query"));
    }

    #[test]
    fn test_validate_arguments_unknown_tool() {
        let err = catalog()
            .validate_arguments("nonexistent", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_fill_defaults_no_overwrite() {
        let catalog = catalog();
        let mut args = serde_json::json!({"query": "test"});
        catalog.fill_defaults("lookup", &mut args).unwrap();
        assert_eq!(args["max_results"], 10);

        let mut args = serde_json::json!({"query": "test", "max_results": 5});
        catalog.fill_defaults("lookup", &mut args).unwrap();
        assert_eq!(args["max_results"], 5);
    }

    #[test]
    fn test_prepare_builds_request() {
        let request = catalog()
            .prepare("lookup", serde_json::json!({"query": "rust", "exact": false}))
            .unwrap();
        assert_eq!(request.path(), "/v1/lookup");
        assert_eq!(
            request.query_pairs(),
            &[
                ("q".to_string(), "rust".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("exact".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_prepare_treats_null_as_absent() {
        let request = catalog()
            .prepare(
                "lookup",
                serde_json::json!({"query": "rust", "max_results": null, "exact": null}),
            )
            .unwrap();
        assert_eq!(request.query_value("limit"), Some("10"));
        assert_eq!(request.query_value("exact"), None);

        let err = catalog().prepare("lookup", Value::Null).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_prepare_rejects_non_object() {
        let err = catalog()
            .prepare("lookup", serde_json::json!(["rust"]))
            .unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn test_descriptor_serializes_camel_case_schema() {
        let descriptors = catalog().descriptors();
        let json = serde_json::to_value(&descriptors[0]).unwrap();
        assert_eq!(json["name"], "lookup");
        assert!(json.get("inputSchema").is_some());
    }
}
