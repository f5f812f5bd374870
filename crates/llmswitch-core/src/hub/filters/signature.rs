//! Gemini `thoughtSignature` bookkeeping.
//!
//! Gemini rejects a replayed `functionCall` part that lacks the signature the
//! model produced with it. Clients routinely drop the field, so signatures
//! seen in responses are cached per session and written back into the next
//! request's `functionCall` parts.

use std::sync::Arc;

use llmswitch_types::Stage;
use serde_json::Value;

use super::{Filter, FilterContext};
use crate::hub::mappers::gemini::is_placeholder_signature;
use crate::hub::mappers::gemini::wrapper::{unwrap_request_mut, unwrap_response};
use crate::hub::signature_cache::SignatureCache;
use crate::hub::HubResult;

fn part_signature(part: &Value) -> Option<&str> {
    part.get("thoughtSignature")
        .or_else(|| part.get("thought_signature"))
        .and_then(Value::as_str)
}

/// request_post: fills missing, empty or placeholder signatures on `functionCall` parts.
pub struct GeminiSignatureInject {
    cache: Arc<SignatureCache>,
}

impl GeminiSignatureInject {
    pub fn new(cache: Arc<SignatureCache>) -> Self {
        Self { cache }
    }
}

impl Filter for GeminiSignatureInject {
    fn name(&self) -> &'static str {
        "gemini_signature_inject"
    }

    fn stage(&self) -> Stage {
        Stage::RequestPost
    }

    fn apply(&self, mut payload: Value, ctx: &FilterContext) -> HubResult<Value> {
        if !ctx.target.requires_signatures() {
            return Ok(payload);
        }
        let Some(session) = &ctx.session else {
            return Ok(payload);
        };
        let Some(signature) = self.cache.get_and_maybe_invalidate(&session.key, session.message_count) else {
            return Ok(payload);
        };

        let mut injected = 0usize;
        let contents = unwrap_request_mut(&mut payload).get_mut("contents").and_then(Value::as_array_mut);
        let parts = contents
            .into_iter()
            .flatten()
            .filter_map(|c| c.get_mut("parts").and_then(Value::as_array_mut))
            .flatten();
        for part in parts {
            if part.get("functionCall").is_none() {
                continue;
            }
            let needs_signature = part_signature(part).map_or(true, |s| s.is_empty() || is_placeholder_signature(s));
            if !needs_signature {
                continue;
            }
            if let Some(obj) = part.as_object_mut() {
                obj.remove("thought_signature");
                obj.insert("thoughtSignature".to_string(), Value::String(signature.clone()));
                injected += 1;
            }
        }

        if injected > 0 {
            tracing::debug!(
                "[Gemini-Wrap] Injected signature (len: {}) into {} functionCall part(s) for session: {}",
                signature.len(),
                injected,
                session.key
            );
        }
        Ok(payload)
    }
}

/// response_pre: stores the last valid signature in the reply under the bound session.
pub struct GeminiSignatureCapture {
    cache: Arc<SignatureCache>,
}

impl GeminiSignatureCapture {
    pub fn new(cache: Arc<SignatureCache>) -> Self {
        Self { cache }
    }
}

impl Filter for GeminiSignatureCapture {
    fn name(&self) -> &'static str {
        "gemini_signature_capture"
    }

    fn stage(&self) -> Stage {
        Stage::ResponsePre
    }

    fn apply(&self, payload: Value, ctx: &FilterContext) -> HubResult<Value> {
        if !ctx.target.requires_signatures() {
            return Ok(payload);
        }
        let Some(session) = &ctx.session else {
            return Ok(payload);
        };

        // every qualifying part overwrites the previous one, so only the last counts
        let min_len = self.cache.min_signature_length();
        let latest = unwrap_response(&payload)
            .get("candidates")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|c| c.pointer("/content/parts").and_then(Value::as_array))
            .flatten()
            .filter_map(part_signature)
            .filter(|s| s.len() >= min_len && !is_placeholder_signature(s))
            .last();

        if let Some(signature) = latest {
            self.cache.put(&session.key, signature, session.message_count, ctx.account_id.as_deref());
        }
        Ok(payload)
    }
}
