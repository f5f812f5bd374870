//! response_map filters. All operate on the canonical response as JSON.

use llmswitch_types::models::CanonicalMessage;
use llmswitch_types::{ConversionError, Protocol, Stage};
use serde_json::Value;

use super::{Filter, FilterContext};
use crate::hub::tools::arguments::normalize_argument_text;
use crate::hub::tools::{harvest_validated, should_harvest, strip_thinking_tags, PermissiveToolRegistry, ToolRegistry};
use crate::hub::HubResult;

fn choices_mut(payload: &mut Value) -> impl Iterator<Item = &mut Value> + '_ {
    payload.get_mut("choices").and_then(Value::as_array_mut).into_iter().flatten()
}

/// Removes thinking wrappers from `content` and `reasoning_content`, keeping the inner text.
pub struct StripThinkingTags;

impl Filter for StripThinkingTags {
    fn name(&self) -> &'static str {
        "strip_thinking_tags"
    }

    fn stage(&self) -> Stage {
        Stage::ResponseMap
    }

    fn apply(&self, mut payload: Value, _ctx: &FilterContext) -> HubResult<Value> {
        for message in choices_mut(&mut payload).filter_map(|c| c.get_mut("message")) {
            if let Some(Value::String(text)) = message.get_mut("reasoning_content") {
                *text = strip_thinking_tags(text);
            }
            match message.get_mut("content") {
                Some(Value::String(text)) => *text = strip_thinking_tags(text),
                Some(Value::Array(parts)) => {
                    for part in parts.iter_mut() {
                        if let Some(Value::String(text)) = part.get_mut("text") {
                            *text = strip_thinking_tags(text);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(payload)
    }
}

/// Recovers tool calls written as markup in the message text.
///
/// Only calls the request's registry accepts are harvested; otherwise the
/// text stays.
pub struct HarvestTextToolCalls;

impl Filter for HarvestTextToolCalls {
    fn name(&self) -> &'static str {
        "harvest_text_tool_calls"
    }

    fn stage(&self) -> Stage {
        Stage::ResponseMap
    }

    fn apply(&self, mut payload: Value, ctx: &FilterContext) -> HubResult<Value> {
        let permissive = PermissiveToolRegistry;
        let registry: &dyn ToolRegistry = ctx.registry.as_deref().unwrap_or(&permissive);
        for choice in choices_mut(&mut payload) {
            let finish = choice.get("finish_reason").and_then(Value::as_str).map(str::to_owned);
            let Some(raw) = choice.get("message") else {
                continue;
            };
            let mut message: CanonicalMessage = serde_json::from_value(raw.clone())
                .map_err(|e| ConversionError::malformed_response(Protocol::OpenAI, e.to_string()))?;
            if !should_harvest(&message, finish.as_deref()) {
                continue;
            }
            let harvested = harvest_validated(&mut message, registry);
            if harvested == 0 {
                continue;
            }
            tracing::info!(
                "[ToolCanonicalizer] Harvested {} tool call(s) from text (request {})",
                harvested,
                ctx.request_id
            );
            let message = serde_json::to_value(&message)
                .map_err(|e| ConversionError::malformed_response(Protocol::OpenAI, e.to_string()))?;
            choice["message"] = message;
            choice["finish_reason"] = Value::String("tool_calls".to_string());
        }
        Ok(payload)
    }
}

/// Re-stringifies structured arguments and repairs near-JSON argument text.
///
/// Text that cannot be repaired is left for the canonicalizer, which drops the call.
pub struct RepairToolArguments;

impl Filter for RepairToolArguments {
    fn name(&self) -> &'static str {
        "repair_tool_arguments"
    }

    fn stage(&self) -> Stage {
        Stage::ResponseMap
    }

    fn apply(&self, mut payload: Value, _ctx: &FilterContext) -> HubResult<Value> {
        let calls = choices_mut(&mut payload)
            .filter_map(|c| c.pointer_mut("/message/tool_calls").and_then(Value::as_array_mut))
            .flatten();
        for call in calls {
            let Some(function) = call.get_mut("function").and_then(Value::as_object_mut) else {
                continue;
            };
            let repaired = match function.get("arguments") {
                Some(Value::String(text)) => match normalize_argument_text(text) {
                    Ok(normalized) if normalized != *text => normalized,
                    _ => continue,
                },
                Some(structured @ (Value::Object(_) | Value::Array(_))) => structured.to_string(),
                _ => continue,
            };
            function.insert("arguments".to_string(), Value::String(repaired));
        }
        Ok(payload)
    }
}

/// Non-empty `tool_calls` means `finish_reason = "tool_calls"`.
pub struct FinishReasonInvariant;

impl Filter for FinishReasonInvariant {
    fn name(&self) -> &'static str {
        "finish_reason_invariant"
    }

    fn stage(&self) -> Stage {
        Stage::ResponseMap
    }

    fn apply(&self, mut payload: Value, _ctx: &FilterContext) -> HubResult<Value> {
        for choice in choices_mut(&mut payload) {
            let has_calls = choice
                .pointer("/message/tool_calls")
                .and_then(Value::as_array)
                .is_some_and(|calls| !calls.is_empty());
            if has_calls && choice.get("finish_reason").and_then(Value::as_str) != Some("tool_calls") {
                choice["finish_reason"] = Value::String("tool_calls".to_string());
            }
        }
        Ok(payload)
    }
}
