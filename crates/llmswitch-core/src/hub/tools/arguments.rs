//! Tool-call argument normalization.
//!
//! Two steps with an explicit contract:
//!
//! 1. [`parse_or_repair`] turns whatever the model produced (object, JSON
//!    text, double-encoded JSON text, slightly broken JSON text) into a JSON
//!    object, or fails with a named [`ArgumentError`].
//! 2. [`serialize_arguments`] renders the object back to compact JSON text.
//!
//! Empty input (`null`, `""`) means "no arguments" and yields `{}`.

use serde_json::{Map, Value};
use thiserror::Error;

/// How many levels of string-wrapped JSON are unwrapped.
const MAX_ENCODING_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Parsed fine but the top-level value is not an object.
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    /// Neither parsing nor repair produced JSON.
    #[error("arguments are not valid JSON: {0}")]
    Unparseable(String),
}

/// Step 1: coerce raw arguments into a JSON object.
pub fn parse_or_repair(raw: &Value) -> Result<Map<String, Value>, ArgumentError> {
    match raw {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::String(s) => parse_text(s, 0),
        other => Err(ArgumentError::NotAnObject(type_name(other))),
    }
}

/// Step 2: render an argument object as compact JSON text.
pub fn serialize_arguments(args: &Map<String, Value>) -> String {
    Value::Object(args.clone()).to_string()
}

/// Both steps: raw arguments to normalized JSON text.
pub fn normalize_arguments(raw: &Value) -> Result<String, ArgumentError> {
    parse_or_repair(raw).map(|args| serialize_arguments(&args))
}

/// Convenience wrapper for arguments already held as text.
pub fn normalize_argument_text(text: &str) -> Result<String, ArgumentError> {
    parse_text(text, 0).map(|args| serialize_arguments(&args))
}

fn parse_text(text: &str, depth: usize) -> Result<Map<String, Value>, ArgumentError> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    let first_error = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return from_parsed(value, depth),
        Err(e) => e.to_string(),
    };

    let repaired = repair_json(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        tracing::debug!("[ToolArgs] Repaired malformed arguments ({} bytes)", text.len());
        return from_parsed(value, depth);
    }

    if let Some(Value::Object(map)) = extract_first_object(trimmed) {
        tracing::debug!("[ToolArgs] Extracted embedded JSON object from arguments text");
        return Ok(map);
    }

    Err(ArgumentError::Unparseable(first_error))
}

fn from_parsed(value: Value, depth: usize) -> Result<Map<String, Value>, ArgumentError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::String(inner) if depth < MAX_ENCODING_DEPTH => parse_text(&inner, depth + 1),
        Value::Null => Ok(Map::new()),
        other => Err(ArgumentError::NotAnObject(type_name(&other))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Best-effort syntactic repair.
///
/// Handles single-quoted JSON, trailing commas and unterminated
/// strings/objects/arrays. Content inside string literals is left alone.
pub fn repair_json(text: &str) -> String {
    let source = if !text.contains('"') && text.contains('\'') {
        text.replace('\'', "\"")
    } else {
        text.to_string()
    };

    let mut out = String::with_capacity(source.len() + 4);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for ch in source.chars() {
        if in_string {
            out.push(ch);
            if escape_next {
                escape_next = false;
            } else if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '{' => {
                closers.push('}');
                out.push(ch);
            }
            '[' => {
                closers.push(']');
                out.push(ch);
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                if closers.last() == Some(&ch) {
                    closers.pop();
                }
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }

    if in_string {
        out.push('"');
    }
    drop_trailing_comma(&mut out);
    while let Some(closer) = closers.pop() {
        out.push(closer);
    }
    out
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

/// First complete JSON object embedded anywhere in `text`.
pub fn extract_first_object(text: &str) -> Option<Value> {
    for (idx, ch) in text.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}
