use llmswitch_types::Protocol;
use serde_json::Value;
use sha2::{Digest, Sha256};

const MIN_ANCHOR_LEN: usize = 10;
const SYSTEM_REMINDER: &str = "<system-reminder>";

/// Session fingerprint utilities
pub struct SessionManager;

impl SessionManager {
    /// Stable session fingerprint (`sid-<16 hex>`) for a wire request.
    ///
    /// Priority:
    /// 1. an explicit session id (caller metadata, Anthropic `metadata.user_id`,
    ///    OpenAI `user`, Gemini `session_id` inside or outside the envelope)
    /// 2. SHA256 of the first user message longer than 10 chars without a `<system-reminder>`
    /// 3. SHA256 of the whole serialized body
    ///
    /// Model name and timestamps are never mixed in, so every turn of one
    /// conversation maps to the same key.
    pub fn fingerprint(protocol: Protocol, body: &Value, explicit_session_id: Option<&str>) -> String {
        if let Some(explicit) = explicit_session_id.or_else(|| embedded_session_id(protocol, body)) {
            let sid = hash_to_sid(explicit.as_bytes());
            tracing::debug!("[SessionManager] Using explicit session id -> {}", sid);
            return sid;
        }

        if let Some(anchor) = first_user_anchor(protocol, body) {
            let sid = hash_to_sid(anchor.as_bytes());
            tracing::debug!("[SessionManager-{}] Generated fingerprint: {}", protocol, sid);
            return sid;
        }

        let sid = hash_to_sid(body.to_string().as_bytes());
        tracing::debug!("[SessionManager-{}] No anchor message, hashed body: {}", protocol, sid);
        sid
    }

    /// Number of conversation turns in a wire request.
    pub fn message_count(protocol: Protocol, body: &Value) -> usize {
        let key = match protocol {
            Protocol::Gemini => "contents",
            Protocol::OpenAI | Protocol::Anthropic => "messages",
        };
        let envelope_inner = body.get("request").filter(|_| protocol == Protocol::Gemini);
        envelope_inner
            .unwrap_or(body)
            .get(key)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

fn hash_to_sid(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let hash = format!("{:x}", hasher.finalize());
    format!("sid-{}", &hash[..16])
}

fn embedded_session_id(protocol: Protocol, body: &Value) -> Option<&str> {
    let id = match protocol {
        Protocol::Anthropic => body.pointer("/metadata/user_id"),
        Protocol::OpenAI => body.get("user"),
        Protocol::Gemini => body.pointer("/request/session_id").or_else(|| body.get("session_id")),
    };
    id.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

fn first_user_anchor(protocol: Protocol, body: &Value) -> Option<String> {
    match protocol {
        Protocol::OpenAI | Protocol::Anthropic => body
            .get("messages")
            .and_then(Value::as_array)?
            .iter()
            .filter(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .map(|m| content_text(m.get("content")))
            .find_map(anchor_text),
        Protocol::Gemini => {
            let inner = body.get("request").unwrap_or(body);
            inner
                .get("contents")
                .and_then(Value::as_array)?
                .iter()
                .filter(|c| c.get("role").and_then(Value::as_str) == Some("user"))
                .map(|c| content_text(c.get("parts")))
                .find_map(anchor_text)
        }
    }
}

fn anchor_text(text: String) -> Option<String> {
    let clean = text.trim();
    (clean.chars().count() > MIN_ANCHOR_LEN && !clean.contains(SYSTEM_REMINDER)).then(|| clean.to_string())
}

/// Text of a string content or of the `text` fields of a block/part list.
fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}
