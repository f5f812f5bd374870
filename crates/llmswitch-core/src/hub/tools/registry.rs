//! Tool registry and argument validation.
//!
//! The canonicalizer asks a [`ToolRegistry`] whether a (name, arguments) pair
//! is acceptable and takes the registry's normalized argument text as the new
//! value. Embedders can plug their own registry; [`SchemaToolRegistry`] is
//! built from the tools declared on the request.

use std::collections::HashMap;
use std::fmt;

use jsonschema::{Draft, JSONSchema};
use llmswitch_types::ToolDefinition;
use serde_json::Value;

use super::arguments::{normalize_argument_text, parse_or_repair, serialize_arguments};
use crate::hub::common::fix_tool_call_args;

/// Outcome of validating one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolValidation {
    pub ok: bool,
    /// Arguments to use instead of the original text when `ok`.
    pub normalized_args: Option<String>,
    /// Why the call was rejected.
    pub reason: Option<String>,
}

impl ToolValidation {
    pub fn accept(normalized_args: String) -> Self {
        Self { ok: true, normalized_args: Some(normalized_args), reason: None }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self { ok: false, normalized_args: None, reason: Some(reason.into()) }
    }
}

/// Validates tool calls before they leave the hub.
pub trait ToolRegistry: Send + Sync {
    fn validate_tool_call(&self, name: &str, args_json: &str) -> ToolValidation;
}

/// Accepts any named call whose arguments form a JSON object.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveToolRegistry;

impl ToolRegistry for PermissiveToolRegistry {
    fn validate_tool_call(&self, name: &str, args_json: &str) -> ToolValidation {
        if name.trim().is_empty() {
            return ToolValidation::reject("tool name is empty");
        }
        match normalize_argument_text(args_json) {
            Ok(normalized) => ToolValidation::accept(normalized),
            Err(e) => ToolValidation::reject(e.to_string()),
        }
    }
}

struct RegisteredTool {
    schema: Value,
    compiled: Option<JSONSchema>,
}

/// Registry built from declared tool definitions.
///
/// With no declared tools every well-formed call passes. Otherwise the name
/// must be declared and, when schema validation is on, the arguments (after
/// type coercion) must satisfy the tool's JSON Schema.
pub struct SchemaToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    validate_schemas: bool,
}

impl SchemaToolRegistry {
    pub fn from_definitions(definitions: &[ToolDefinition], validate_schemas: bool) -> Self {
        let mut tools = HashMap::with_capacity(definitions.len());
        for def in definitions {
            let schema = def.function.parameters.clone();
            let compiled = if validate_schemas {
                match JSONSchema::options().with_draft(Draft::Draft7).compile(&schema) {
                    Ok(compiled) => Some(compiled),
                    Err(e) => {
                        tracing::warn!(
                            "[ToolRegistry] Schema for '{}' does not compile, arguments unchecked: {}",
                            def.name(),
                            e
                        );
                        None
                    }
                }
            } else {
                None
            };
            tools.insert(def.name().to_string(), RegisteredTool { schema, compiled });
        }
        Self { tools, validate_schemas }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl fmt::Debug for SchemaToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("SchemaToolRegistry")
            .field("tools", &names)
            .field("validate_schemas", &self.validate_schemas)
            .finish()
    }
}

impl ToolRegistry for SchemaToolRegistry {
    fn validate_tool_call(&self, name: &str, args_json: &str) -> ToolValidation {
        if self.tools.is_empty() {
            return PermissiveToolRegistry.validate_tool_call(name, args_json);
        }
        let Some(tool) = self.tools.get(name) else {
            return ToolValidation::reject(format!("unknown tool '{}'", name));
        };

        let mut args = match parse_or_repair(&Value::String(args_json.to_string())) {
            Ok(map) => Value::Object(map),
            Err(e) => return ToolValidation::reject(e.to_string()),
        };
        fix_tool_call_args(&mut args, &tool.schema);

        if let Some(compiled) = &tool.compiled {
            if let Err(errors) = compiled.validate(&args) {
                let reason = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
                return ToolValidation::reject(format!("'{}' arguments invalid: {}", name, reason));
            }
        }

        match args {
            Value::Object(map) => ToolValidation::accept(serialize_arguments(&map)),
            _ => ToolValidation::reject("arguments are not an object"),
        }
    }
}
