// Gemini response transformation (generateContent <-> canonical)

use llmswitch_types::models::{CanonicalMessage, CanonicalResponse, Choice, MessageContent, ToolCall, Usage};
use llmswitch_types::protocol::gemini::{
    Candidate, GeminiContent, GeminiFunctionCall, GeminiPart, GeminiResponse, UsageMetadata,
};
use llmswitch_types::{ConversionError, Protocol};
use serde_json::{json, Value};

use super::wrapper::unwrap_response;
use crate::hub::common::{generate_call_id, generate_random_id};
use crate::hub::tools::parse_or_repair;
use crate::hub::HubResult;

/// Gemini `finishReason` -> OpenAI `finish_reason`.
pub fn finish_from_gemini(reason: &str) -> &'static str {
    match reason {
        "MAX_TOKENS" => "length",
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => "content_filter",
        _ => "stop",
    }
}

/// OpenAI `finish_reason` -> Gemini `finishReason`.
pub fn gemini_from_finish(reason: &str) -> &'static str {
    match reason {
        "length" => "MAX_TOKENS",
        "content_filter" => "SAFETY",
        _ => "STOP",
    }
}

/// Gemini reply (bare or enveloped) -> canonical.
///
/// A reply without candidates is malformed; a `promptFeedback.blockReason`
/// or `error.message` becomes the error detail.
pub fn decode_response(payload: &Value, model_hint: &str) -> HubResult<CanonicalResponse> {
    let inner = unwrap_response(payload);

    if let Some(message) = inner.pointer("/error/message").and_then(Value::as_str) {
        return Err(ConversionError::malformed_response(Protocol::Gemini, format!("upstream error: {}", message)));
    }
    let has_candidates = inner.get("candidates").and_then(Value::as_array).is_some_and(|c| !c.is_empty());
    if !has_candidates {
        let detail = inner
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .map_or_else(|| "response has no candidates".to_string(), |r| format!("prompt blocked: {}", r));
        return Err(ConversionError::malformed_response(Protocol::Gemini, detail));
    }

    let resp: GeminiResponse = serde_json::from_value(inner.clone())
        .map_err(|e| ConversionError::malformed_response(Protocol::Gemini, e.to_string()))?;
    let candidate = resp.candidates.as_ref().and_then(|c| c.first());
    let parts = candidate.and_then(|c| c.content.as_ref()).map(|c| c.parts.as_slice()).unwrap_or_default();

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut calls = Vec::new();
    for part in parts {
        if let Some(fc) = &part.function_call {
            let id = fc.id.clone().filter(|id| !id.is_empty()).unwrap_or_else(generate_call_id);
            let args = fc.args.as_ref().map_or_else(|| "{}".to_string(), Value::to_string);
            let call = ToolCall::new(id, fc.name.clone(), args);
            calls.push(call.with_thought_signature(part.thought_signature.clone()));
        } else if let Some(t) = &part.text {
            if part.is_thought() {
                reasoning.push_str(t);
            } else {
                text.push_str(t);
            }
        }
    }

    let finish_reason = if calls.is_empty() {
        candidate.and_then(|c| c.finish_reason.as_deref()).map(finish_from_gemini)
    } else {
        Some("tool_calls")
    };

    let message = CanonicalMessage {
        role: "assistant".to_string(),
        content: if text.is_empty() && !calls.is_empty() { None } else { Some(MessageContent::Text(text)) },
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        tool_calls: if calls.is_empty() { None } else { Some(calls) },
        ..Default::default()
    };

    let usage = resp.usage_metadata.map(|u| {
        Usage::new(u.prompt_token_count.unwrap_or_default(), u.candidates_token_count.unwrap_or_default())
    });

    Ok(CanonicalResponse {
        id: resp.response_id.clone().unwrap_or_else(|| format!("chatcmpl-{}", generate_random_id())),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: resp.model_version.clone().unwrap_or_else(|| model_hint.to_string()),
        choices: vec![Choice { index: 0, message, finish_reason: finish_reason.map(str::to_string) }],
        usage,
    })
}

/// Canonical response -> Gemini reply (for Gemini-speaking clients).
pub fn encode_response(resp: &CanonicalResponse) -> HubResult<Value> {
    let choice = resp
        .first_choice()
        .ok_or_else(|| ConversionError::malformed_response(Protocol::OpenAI, "response has no choices"))?;
    let msg = &choice.message;

    let mut parts = Vec::new();
    if let Some(reasoning) = msg.reasoning_content.as_deref().filter(|r| !r.is_empty()) {
        parts.push(GeminiPart { text: Some(reasoning.to_string()), thought: Some(true), ..Default::default() });
    }
    let text = msg.text();
    if !text.is_empty() {
        parts.push(GeminiPart::text(text));
    }
    for call in msg.calls() {
        let args = parse_or_repair(&Value::String(call.function.arguments.clone()))
            .map(Value::Object)
            .unwrap_or_else(|_| json!({}));
        parts.push(GeminiPart {
            function_call: Some(GeminiFunctionCall {
                name: call.function.name.clone(),
                id: (!call.id.is_empty()).then(|| call.id.clone()),
                args: Some(args),
            }),
            thought_signature: call.thought_signature.clone(),
            ..Default::default()
        });
    }

    let out = GeminiResponse {
        candidates: Some(vec![Candidate {
            content: Some(GeminiContent { role: "model".to_string(), parts }),
            finish_reason: Some(gemini_from_finish(choice.finish_reason.as_deref().unwrap_or("stop")).to_string()),
            index: Some(0),
        }]),
        usage_metadata: resp.usage.filter(|u| !u.is_empty()).map(|u| UsageMetadata {
            prompt_token_count: Some(u.prompt_tokens),
            candidates_token_count: Some(u.completion_tokens),
            total_token_count: Some(u.total_tokens),
        }),
        model_version: (!resp.model.is_empty()).then(|| resp.model.clone()),
        response_id: (!resp.id.is_empty()).then(|| resp.id.clone()),
    };
    serde_json::to_value(out).map_err(|e| ConversionError::malformed_response(Protocol::Gemini, e.to_string()))
}
