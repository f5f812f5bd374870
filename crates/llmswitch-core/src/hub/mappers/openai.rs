//! OpenAI Chat Completions <-> canonical.
//!
//! The canonical shape is the OpenAI shape, so this is mostly serde plus the
//! structural checks a provider reply has to pass.

use llmswitch_types::models::{CanonicalRequest, CanonicalResponse};
use llmswitch_types::{ConversionError, Protocol};
use serde_json::Value;

use crate::hub::HubResult;

pub fn decode_request(payload: &Value) -> HubResult<CanonicalRequest> {
    if !payload.get("messages").is_some_and(Value::is_array) {
        return Err(ConversionError::malformed_request(Protocol::OpenAI, "request has no messages array"));
    }
    serde_json::from_value(payload.clone())
        .map_err(|e| ConversionError::malformed_request(Protocol::OpenAI, e.to_string()))
}

pub fn encode_request(req: &CanonicalRequest) -> HubResult<Value> {
    let mut out =
        serde_json::to_value(req).map_err(|e| ConversionError::malformed_request(Protocol::OpenAI, e.to_string()))?;
    if let Some(messages) = out.get_mut("messages").and_then(Value::as_array_mut) {
        messages.iter_mut().for_each(strip_hub_fields);
    }
    Ok(out)
}

/// Provider reply -> canonical. An `error` object or a missing `choices`
/// array is a malformed response.
pub fn decode_response(payload: &Value) -> HubResult<CanonicalResponse> {
    if let Some(err) = payload.get("error").filter(|e| !e.is_null()) {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| err.to_string(), str::to_string);
        return Err(ConversionError::malformed_response(Protocol::OpenAI, format!("upstream error: {}", message)));
    }
    if !payload.get("choices").is_some_and(Value::is_array) {
        return Err(ConversionError::malformed_response(Protocol::OpenAI, "response has no choices array"));
    }
    serde_json::from_value(payload.clone())
        .map_err(|e| ConversionError::malformed_response(Protocol::OpenAI, e.to_string()))
}

pub fn encode_response(resp: &CanonicalResponse) -> HubResult<Value> {
    let mut out =
        serde_json::to_value(resp).map_err(|e| ConversionError::malformed_response(Protocol::OpenAI, e.to_string()))?;
    if let Some(choices) = out.get_mut("choices").and_then(Value::as_array_mut) {
        choices.iter_mut().filter_map(|c| c.get_mut("message")).for_each(strip_hub_fields);
    }
    Ok(out)
}

/// Canonical-only fields (tool error flags, Gemini call signatures) are not
/// OpenAI wire fields.
fn strip_hub_fields(message: &mut Value) {
    if let Some(fields) = message.as_object_mut() {
        fields.remove("is_error");
    }
    let calls = message.get_mut("tool_calls").and_then(Value::as_array_mut);
    for call in calls.into_iter().flatten().filter_map(Value::as_object_mut) {
        call.remove("thought_signature");
    }
}
