// Gemini envelope wrap/unwrap

use llmswitch_types::GeminiEnvelopeConfig;
use serde_json::{json, Value};

/// Wrap a bare `generateContent` body in the `request`-scoped envelope.
pub fn wrap_request(inner: Value, project_id: &str, model: &str, config: &GeminiEnvelopeConfig) -> Value {
    let request_id = format!("agent-{}", uuid::Uuid::new_v4());
    tracing::debug!("[Gemini-Wrap] project='{}', model='{}', requestId='{}'", project_id, model, request_id);
    json!({
        "project": project_id,
        "requestId": request_id,
        "request": inner,
        "model": model,
        "userAgent": config.user_agent,
        "requestType": config.request_type
    })
}

pub fn is_enveloped(body: &Value) -> bool {
    body.get("request").is_some_and(Value::is_object)
}

/// Inner request of an envelope, or the body itself when bare.
pub fn unwrap_request(body: &Value) -> &Value {
    body.get("request").filter(|r| r.is_object()).unwrap_or(body)
}

pub fn unwrap_request_mut(body: &mut Value) -> &mut Value {
    if is_enveloped(body) {
        &mut body["request"]
    } else {
        body
    }
}

/// Inner response of an envelope (`{"response": {...}}`), or the body itself.
pub fn unwrap_response(body: &Value) -> &Value {
    body.get("response").filter(|r| r.is_object()).unwrap_or(body)
}

pub fn unwrap_response_mut(body: &mut Value) -> &mut Value {
    if body.get("response").is_some_and(Value::is_object) {
        &mut body["response"]
    } else {
        body
    }
}
