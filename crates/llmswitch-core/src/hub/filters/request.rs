//! request_map filters. All operate on the canonical request as JSON.

use std::collections::HashSet;

use llmswitch_types::{ConversionError, Stage};
use serde_json::Value;

use super::{Filter, FilterContext};
use crate::hub::common::prune_schema_keyword;
use crate::hub::HubResult;

/// Object-shaped `function.arguments` become JSON text; `null` becomes `{}`.
pub struct StringifyToolArguments;

impl Filter for StringifyToolArguments {
    fn name(&self) -> &'static str {
        "stringify_tool_arguments"
    }

    fn stage(&self) -> Stage {
        Stage::RequestMap
    }

    fn apply(&self, mut payload: Value, _ctx: &FilterContext) -> HubResult<Value> {
        let Some(messages) = payload.get_mut("messages").and_then(Value::as_array_mut) else {
            return Ok(payload);
        };
        for call in messages
            .iter_mut()
            .filter_map(|m| m.get_mut("tool_calls").and_then(Value::as_array_mut))
            .flatten()
        {
            let Some(function) = call.get_mut("function").and_then(Value::as_object_mut) else {
                continue;
            };
            let text = match function.get("arguments") {
                None | Some(Value::Null) => "{}".to_string(),
                Some(Value::String(_)) => continue,
                Some(other) => other.to_string(),
            };
            function.insert("arguments".to_string(), Value::String(text));
        }
        Ok(payload)
    }
}

/// Tools present and no choice → `"auto"`; no tools → no choice.
pub struct ToolChoiceDefault;

impl Filter for ToolChoiceDefault {
    fn name(&self) -> &'static str {
        "tool_choice_default"
    }

    fn stage(&self) -> Stage {
        Stage::RequestMap
    }

    fn apply(&self, mut payload: Value, _ctx: &FilterContext) -> HubResult<Value> {
        let Some(obj) = payload.as_object_mut() else {
            return Ok(payload);
        };
        let has_tools = obj.get("tools").and_then(Value::as_array).is_some_and(|t| !t.is_empty());
        if has_tools {
            if obj.get("tool_choice").map_or(true, Value::is_null) {
                obj.insert("tool_choice".to_string(), Value::String("auto".to_string()));
            }
        } else {
            obj.remove("tools");
            obj.remove("tool_choice");
        }
        Ok(payload)
    }
}

/// Drops `$schema` from every tool's parameters.
pub struct PruneToolSchema;

impl Filter for PruneToolSchema {
    fn name(&self) -> &'static str {
        "prune_tool_schema"
    }

    fn stage(&self) -> Stage {
        Stage::RequestMap
    }

    fn apply(&self, mut payload: Value, _ctx: &FilterContext) -> HubResult<Value> {
        if let Some(tools) = payload.get_mut("tools").and_then(Value::as_array_mut) {
            for params in tools.iter_mut().filter_map(|t| t.pointer_mut("/function/parameters")) {
                prune_schema_keyword(params);
            }
        }
        Ok(payload)
    }
}

/// Every tool message must answer a call made earlier in the conversation.
pub struct ToolResultPairing;

impl Filter for ToolResultPairing {
    fn name(&self) -> &'static str {
        "tool_result_pairing"
    }

    fn stage(&self) -> Stage {
        Stage::RequestMap
    }

    fn apply(&self, payload: Value, ctx: &FilterContext) -> HubResult<Value> {
        let Some(messages) = payload.get("messages").and_then(Value::as_array) else {
            return Ok(payload);
        };

        let mut seen: HashSet<&str> = HashSet::new();
        for (index, msg) in messages.iter().enumerate() {
            match msg.get("role").and_then(Value::as_str) {
                Some("assistant") => {
                    let ids = msg
                        .get("tool_calls")
                        .and_then(Value::as_array)
                        .into_iter()
                        .flatten()
                        .filter_map(|c| c.get("id").and_then(Value::as_str))
                        .filter(|id| !id.is_empty());
                    seen.extend(ids);
                }
                Some("tool") => {
                    let id = msg.get("tool_call_id").and_then(Value::as_str).unwrap_or_default();
                    if id.is_empty() {
                        return Err(ConversionError::tool_protocol(
                            ctx.source,
                            format!("tool message at index {} has no tool_call_id", index),
                        ));
                    }
                    if !seen.contains(id) {
                        return Err(ConversionError::tool_protocol(
                            ctx.source,
                            format!("tool result '{}' has no preceding tool call", id),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(payload)
    }
}
