// Claude response transformation (canonical <-> Anthropic Messages)

use llmswitch_types::models::{CanonicalMessage, CanonicalResponse, Choice, MessageContent, ToolCall, Usage};
use llmswitch_types::protocol::claude::{ClaudeResponse, ClaudeUsage, ContentBlock};
use llmswitch_types::{ConversionError, Protocol};
use serde_json::{json, Value};

use crate::hub::common::generate_random_id;
use crate::hub::tools::parse_or_repair;
use crate::hub::HubResult;

/// OpenAI `finish_reason` -> Anthropic `stop_reason`.
pub fn stop_reason_from_finish(finish_reason: &str) -> Option<&'static str> {
    match finish_reason {
        "tool_calls" | "function_call" => Some("tool_use"),
        "stop" => Some("end_turn"),
        "length" => Some("max_tokens"),
        "content_filter" => Some("refusal"),
        _ => None,
    }
}

/// Anthropic `stop_reason` -> OpenAI `finish_reason`.
pub fn finish_from_stop_reason(stop_reason: &str) -> &'static str {
    match stop_reason {
        "tool_use" => "tool_calls",
        "max_tokens" => "length",
        "refusal" => "content_filter",
        _ => "stop",
    }
}

/// Usage in Anthropic form, `None` when both counts are zero.
pub fn to_claude_usage(usage: Option<&Usage>) -> Option<ClaudeUsage> {
    usage.filter(|u| !u.is_empty()).map(|u| ClaudeUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        cache_read_input_tokens: None,
    })
}

/// Canonical response -> Anthropic message.
///
/// Uses the first choice. Blank text produces no text block; tool arguments
/// that do not parse become `{}` rather than failing the response.
pub fn encode_response(resp: &CanonicalResponse) -> HubResult<Value> {
    let choice = resp
        .first_choice()
        .ok_or_else(|| ConversionError::malformed_response(Protocol::OpenAI, "response has no choices"))?;
    let msg = &choice.message;

    let mut content = Vec::new();
    if let Some(reasoning) = msg.reasoning_content.as_deref().filter(|r| !r.trim().is_empty()) {
        content.push(ContentBlock::Thinking { thinking: reasoning.to_string(), signature: None });
    }
    let text = msg.text();
    if !text.trim().is_empty() {
        content.push(ContentBlock::Text { text });
    }
    for call in msg.calls() {
        let input = parse_or_repair(&Value::String(call.function.arguments.clone()))
            .map(Value::Object)
            .unwrap_or_else(|e| {
                tracing::warn!(
                    "[Claude-Response] Arguments of '{}' unparseable, sending {{}}: {}",
                    call.function.name,
                    e
                );
                json!({})
            });
        content.push(ContentBlock::ToolUse { id: call.id.clone(), name: call.function.name.clone(), input });
    }

    let has_tool_use = content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
    let stop_reason = match choice.finish_reason.as_deref() {
        Some(reason) => stop_reason_from_finish(reason).unwrap_or("end_turn"),
        None if has_tool_use => "tool_use",
        None => "end_turn",
    };

    let out = ClaudeResponse {
        id: if resp.id.is_empty() { format!("msg_{}", generate_random_id()) } else { resp.id.clone() },
        type_: "message".to_string(),
        role: "assistant".to_string(),
        model: resp.model.clone(),
        content,
        stop_reason: Some(stop_reason.to_string()),
        stop_sequence: None,
        usage: to_claude_usage(resp.usage.as_ref()),
    };
    serde_json::to_value(out).map_err(|e| ConversionError::malformed_response(Protocol::Anthropic, e.to_string()))
}

/// Anthropic message (provider reply) -> canonical.
pub fn decode_response(payload: &Value) -> HubResult<CanonicalResponse> {
    if payload.get("type").and_then(Value::as_str) == Some("error") || payload.get("error").is_some_and(|e| !e.is_null())
    {
        let message = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("upstream returned an error");
        return Err(ConversionError::malformed_response(Protocol::Anthropic, message.to_string()));
    }
    let resp: ClaudeResponse = serde_json::from_value(payload.clone())
        .map_err(|e| ConversionError::malformed_response(Protocol::Anthropic, e.to_string()))?;

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut calls = Vec::new();
    for block in &resp.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::Thinking { thinking, .. } => reasoning.push_str(thinking),
            ContentBlock::ToolUse { id, name, input } => {
                let args = if input.is_null() { "{}".to_string() } else { input.to_string() };
                calls.push(ToolCall::new(id.clone(), name.clone(), args));
            }
            _ => {}
        }
    }

    let message = CanonicalMessage {
        role: "assistant".to_string(),
        content: if text.is_empty() && !calls.is_empty() { None } else { Some(MessageContent::Text(text)) },
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        tool_calls: if calls.is_empty() { None } else { Some(calls) },
        ..Default::default()
    };
    let finish_reason = resp.stop_reason.as_deref().map(finish_from_stop_reason).map(str::to_string);

    Ok(CanonicalResponse {
        usage: resp.usage.map(|u| Usage::new(u.input_tokens, u.output_tokens)),
        choices: vec![Choice { index: 0, message, finish_reason }],
        ..CanonicalResponse::new(resp.id, resp.model, chrono::Utc::now().timestamp(), CanonicalMessage::default())
    })
}
