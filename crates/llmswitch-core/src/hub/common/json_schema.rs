//! JSON Schema helpers for tool definitions and tool-call arguments.

use serde_json::{Map, Value};

const MAX_RECURSION_DEPTH: usize = 64;

/// Keywords Gemini function declarations reject.
const GEMINI_UNSUPPORTED_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "additionalProperties",
    "strict",
    "format",
    "default",
    "examples",
    "uniqueItems",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

/// Remove every `$schema` keyword, at any depth.
pub fn prune_schema_keyword(value: &mut Value) {
    remove_keywords(value, &["$schema"], 0);
}

/// Prepare a tool parameter schema for a Gemini `functionDeclarations` entry.
///
/// 1. Removes keywords Gemini does not accept
/// 2. Collapses nullable unions: `["string", "null"]` -> `"string"`
/// 3. Upper-cases `type` values (`object` -> `OBJECT`)
pub fn clean_schema_for_gemini(value: &mut Value) {
    remove_keywords(value, GEMINI_UNSUPPORTED_KEYWORDS, 0);
    normalize_types(value, 0, str::to_uppercase);

    if let Some(obj) = value.as_object_mut() {
        obj.entry("type").or_insert_with(|| Value::String("OBJECT".to_string()));
    }
}

fn remove_keywords(value: &mut Value, keywords: &[&str], depth: usize) {
    if depth > MAX_RECURSION_DEPTH {
        tracing::warn!("[JSON-Schema] Recursion depth {} exceeded, leaving schema as is", depth);
        return;
    }
    match value {
        Value::Object(map) => {
            for keyword in keywords {
                map.remove(*keyword);
            }
            for (key, child) in map.iter_mut() {
                // property names are data, only their schemas are cleaned
                if key == "properties" {
                    if let Value::Object(props) = child {
                        for prop in props.values_mut() {
                            remove_keywords(prop, keywords, depth + 1);
                        }
                    }
                } else {
                    remove_keywords(child, keywords, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                remove_keywords(item, keywords, depth + 1);
            }
        }
        _ => {}
    }
}

/// Gemini-style `OBJECT`/`STRING` types back to JSON Schema lower case.
pub fn lowercase_schema_types(value: &mut Value) {
    normalize_types(value, 0, str::to_lowercase);
}

fn normalize_types(value: &mut Value, depth: usize, case: fn(&str) -> String) {
    if depth > MAX_RECURSION_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            if let Some(t) = map.get_mut("type") {
                normalize_type_value(t, case);
            }
            for (key, child) in map.iter_mut() {
                if key == "type" && !child.is_object() {
                    continue;
                }
                normalize_types(child, depth + 1, case);
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_types(item, depth + 1, case);
            }
        }
        _ => {}
    }
}

fn normalize_type_value(t: &mut Value, case: fn(&str) -> String) {
    match t {
        Value::String(s) => *s = case(s),
        Value::Array(options) => {
            let first = options
                .iter()
                .filter_map(Value::as_str)
                .find(|s| *s != "null")
                .unwrap_or("string");
            *t = Value::String(case(first));
        }
        _ => {}
    }
}

/// Fix tool call argument types to match schema definition.
/// Converts: "123" -> 123 (string to number), "true" -> true (string to boolean), etc.
pub fn fix_tool_call_args(args: &mut Value, schema: &Value) {
    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        if let Some(args_obj) = args.as_object_mut() {
            coerce_properties(args_obj, properties);
        }
    }
}

fn coerce_properties(args: &mut Map<String, Value>, properties: &Map<String, Value>) {
    for (key, value) in args.iter_mut() {
        if let Some(prop_schema) = properties.get(key) {
            coerce_value(value, prop_schema);
        }
    }
}

fn coerce_value(value: &mut Value, schema: &Value) {
    if let Some(nested_props) = schema.get("properties").and_then(|p| p.as_object()) {
        if let Some(value_obj) = value.as_object_mut() {
            coerce_properties(value_obj, nested_props);
        }
        return;
    }

    let schema_type = schema.get("type").and_then(|t| t.as_str()).unwrap_or("").to_lowercase();
    match schema_type.as_str() {
        "array" => {
            if let (Some(items_schema), Some(arr)) = (schema.get("items"), value.as_array_mut()) {
                for item in arr {
                    coerce_value(item, items_schema);
                }
            }
        }
        "number" | "integer" => {
            if let Some(s) = value.as_str() {
                // leading zeros mean an identifier ("007"), not a number
                if s.starts_with('0') && s.len() > 1 && !s.starts_with("0.") {
                    return;
                }
                if let Ok(i) = s.parse::<i64>() {
                    *value = Value::Number(i.into());
                } else if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                    *value = Value::Number(n);
                }
            }
        }
        "boolean" => {
            if let Some(s) = value.as_str() {
                match s.to_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => *value = Value::Bool(true),
                    "false" | "0" | "no" | "off" => *value = Value::Bool(false),
                    _ => {}
                }
            } else if let Some(n) = value.as_i64() {
                match n {
                    1 => *value = Value::Bool(true),
                    0 => *value = Value::Bool(false),
                    _ => {}
                }
            }
        }
        "string" => {
            if value.is_number() || value.is_boolean() {
                *value = Value::String(value.to_string());
            }
        }
        _ => {}
    }
}
