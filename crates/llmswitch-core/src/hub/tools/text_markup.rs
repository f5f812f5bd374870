//! Text markup normalizer.
//!
//! Recovers tool calls that a model wrote into its text output instead of the
//! structured channel. Recognized forms, tried in order (first form that
//! yields at least one call wins):
//!
//! 1. `<tool_call>...</tool_call>` with a JSON body `{"name", "arguments"}`
//!    or a function-name line followed by `<arg_key>`/`<arg_value>` pairs
//! 2. an apply_patch block `*** Begin Patch ... *** End Patch`
//! 3. `<function=NAME>` with `<parameter=KEY>value</parameter>` children
//!    (`execute` maps to `shell`)
//! 4. loose `<arg_key>`/`<arg_value>` pairs, tool name inferred from the keys
//!
//! Extraction is pure: text in, `Option<Vec<ExtractedCall>>` out.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::arguments::{extract_first_object, parse_or_repair};
use super::inference::{self, infer_from_keys, PATCH_BEGIN, PATCH_END};

static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call>(.*?)(?:</tool_call>|$)").expect("Tool call regex is valid")
});

static ARG_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<arg_key>\s*(.*?)\s*</arg_key>\s*<arg_value>(.*?)</arg_value>")
        .expect("Arg pair regex is valid")
});

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<function=([^>\s]+)>(.*?)</function>").expect("Function block regex is valid")
});

static PARAMETER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<parameter=([^>\s]+)>(.*?)</parameter>").expect("Parameter regex is valid")
});

/// A tool call recovered from text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ExtractedCall {
    fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self { name: name.into(), arguments }
    }
}

/// Markers whose presence makes a `stop` response worth harvesting.
pub fn has_tool_markup(text: &str) -> bool {
    text.contains("<tool_call")
        || text.contains("<arg_key")
        || text.contains("<function=execute>")
        || text.contains(PATCH_BEGIN)
}

/// Extract tool calls from free text. `None` when no form matched.
pub fn extract_tool_calls(text: &str) -> Option<Vec<ExtractedCall>> {
    let extractors: [fn(&str) -> Vec<ExtractedCall>; 4] =
        [from_tool_call_tags, from_patch_block, from_function_tags, from_loose_arg_pairs];

    extractors.iter().map(|extract| extract(text)).find(|calls| !calls.is_empty())
}

fn from_tool_call_tags(text: &str) -> Vec<ExtractedCall> {
    if !text.contains("<tool_call>") {
        return Vec::new();
    }
    TOOL_CALL_RE
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).and_then(|body| parse_tool_call_body(body.as_str())))
        .collect()
}

fn parse_tool_call_body(body: &str) -> Option<ExtractedCall> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if body.starts_with('{') {
        if let Some(call) = extract_first_object(body).and_then(|v| call_from_json(&v)) {
            return Some(call);
        }
    }

    let (name_part, pairs_part) = match body.find("<arg_key>") {
        Some(idx) => (&body[..idx], &body[idx..]),
        None => (body, ""),
    };
    let args = collect_arg_pairs(pairs_part);
    let name = name_part.lines().next().unwrap_or("").trim();

    if is_identifier(name) {
        return Some(ExtractedCall::new(name, args));
    }
    infer_from_keys(&args).map(|inferred| ExtractedCall::new(inferred, args))
}

fn call_from_json(v: &Value) -> Option<ExtractedCall> {
    let obj = v.as_object()?;
    // some models nest the call as {"function": {...}}
    let obj = obj.get("function").and_then(Value::as_object).unwrap_or(obj);

    let raw_args = obj.get("arguments").or_else(|| obj.get("parameters")).or_else(|| obj.get("input"));
    let args = match raw_args {
        Some(raw) => parse_or_repair(raw).ok()?,
        None => Map::new(),
    };

    match obj.get("name").and_then(Value::as_str).map(str::trim) {
        Some(name) if !name.is_empty() => Some(ExtractedCall::new(name, args)),
        _ => inference::infer_tool_name(&args).map(|inferred| ExtractedCall::new(inferred, args)),
    }
}

fn from_patch_block(text: &str) -> Vec<ExtractedCall> {
    let Some(start) = text.find(PATCH_BEGIN) else {
        return Vec::new();
    };
    let Some(end_rel) = text[start..].find(PATCH_END) else {
        return Vec::new();
    };
    let patch = &text[start..start + end_rel + PATCH_END.len()];

    let mut args = Map::new();
    args.insert("patch".to_string(), Value::String(patch.to_string()));
    vec![ExtractedCall::new(inference::APPLY_PATCH, args)]
}

fn from_function_tags(text: &str) -> Vec<ExtractedCall> {
    FUNCTION_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let declared = cap.get(1)?.as_str();
            let body = cap.get(2).map_or("", |m| m.as_str());

            let mut args = Map::new();
            for param in PARAMETER_RE.captures_iter(body) {
                let (Some(key), Some(value)) = (param.get(1), param.get(2)) else {
                    continue;
                };
                args.insert(key.as_str().to_string(), Value::String(trim_newlines(value.as_str()).to_string()));
            }

            let name = if declared == "execute" { inference::SHELL } else { declared };
            Some(ExtractedCall::new(name, args))
        })
        .collect()
}

fn from_loose_arg_pairs(text: &str) -> Vec<ExtractedCall> {
    if !text.contains("<arg_key>") {
        return Vec::new();
    }
    let args = collect_arg_pairs(text);
    match infer_from_keys(&args) {
        Some(name) => vec![ExtractedCall::new(name, args)],
        None => {
            tracing::debug!("[TextMarkup] Arg pairs without a recognizable tool name, leaving text as is");
            Vec::new()
        }
    }
}

fn collect_arg_pairs(text: &str) -> Map<String, Value> {
    let mut args = Map::new();
    for cap in ARG_PAIR_RE.captures_iter(text) {
        let (Some(key), Some(value)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        args.insert(key.as_str().to_string(), parse_arg_value(value.as_str()));
    }
    args
}

/// Structured values (`[...]`, `{...}`) are parsed; everything else stays text.
fn parse_arg_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
            return v;
        }
    }
    Value::String(trim_newlines(raw).to_string())
}

fn trim_newlines(s: &str) -> &str {
    s.trim_matches(|c| c == '\n' || c == '\r')
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}
