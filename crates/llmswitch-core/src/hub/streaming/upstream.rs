//! Provider SSE events -> canonical chunks.

use llmswitch_types::models::{ChatCompletionChunk, ChunkChoice, Delta, FunctionCallDelta, ToolCallDelta, Usage};
use llmswitch_types::protocol::gemini::GeminiResponse;
use llmswitch_types::{ConversionError, Protocol};
use serde_json::Value;

use super::sse::SseEvent;
use crate::hub::common::{generate_call_id, generate_random_id};
use crate::hub::mappers::gemini::wrapper::unwrap_response;
use crate::hub::mappers::gemini::{finish_from_gemini, is_placeholder_signature};
use crate::hub::HubResult;

/// What one upstream event turned into.
#[derive(Debug, Default)]
pub(super) struct Decoded {
    pub chunks: Vec<ChatCompletionChunk>,
    /// `thoughtSignature` values in arrival order.
    pub signatures: Vec<String>,
    pub done: bool,
}

#[derive(Debug)]
pub(super) enum ChunkDecoder {
    OpenAI,
    Gemini(GeminiChunkState),
}

#[derive(Debug)]
pub(super) struct GeminiChunkState {
    id: String,
    model: String,
    created: i64,
    next_tool_index: u32,
    role_sent: bool,
}

impl ChunkDecoder {
    pub fn for_protocol(protocol: Protocol, model: &str) -> Option<Self> {
        match protocol {
            Protocol::OpenAI => Some(Self::OpenAI),
            Protocol::Gemini => Some(Self::Gemini(GeminiChunkState {
                id: format!("chatcmpl-{}", generate_random_id()),
                model: model.to_string(),
                created: chrono::Utc::now().timestamp(),
                next_tool_index: 0,
                role_sent: false,
            })),
            Protocol::Anthropic => None,
        }
    }

    pub fn decode(&mut self, event: &SseEvent) -> HubResult<Decoded> {
        match self {
            Self::OpenAI => decode_openai(event),
            Self::Gemini(state) => state.decode(event),
        }
    }
}

fn decode_openai(event: &SseEvent) -> HubResult<Decoded> {
    if event.is_done() {
        return Ok(Decoded { done: true, ..Default::default() });
    }
    let value = event.json(Protocol::OpenAI)?;
    if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
        return Err(ConversionError::malformed_response(Protocol::OpenAI, format!("stream error: {}", message)));
    }
    let chunk: ChatCompletionChunk = serde_json::from_value(value)
        .map_err(|e| ConversionError::sse_decode(Protocol::OpenAI, format!("unexpected chunk shape: {}", e)))?;
    Ok(Decoded { chunks: vec![chunk], ..Default::default() })
}

impl GeminiChunkState {
    fn decode(&mut self, event: &SseEvent) -> HubResult<Decoded> {
        if event.is_done() {
            return Ok(Decoded { done: true, ..Default::default() });
        }
        let raw = event.json(Protocol::Gemini)?;
        let inner = unwrap_response(&raw);
        if let Some(message) = inner.pointer("/error/message").and_then(Value::as_str) {
            return Err(ConversionError::malformed_response(Protocol::Gemini, format!("stream error: {}", message)));
        }
        let resp: GeminiResponse = serde_json::from_value(inner.clone())
            .map_err(|e| ConversionError::sse_decode(Protocol::Gemini, format!("unexpected chunk shape: {}", e)))?;

        if let Some(version) = resp.model_version.as_deref().filter(|v| !v.is_empty()) {
            self.model = version.to_string();
        }
        if let Some(id) = resp.response_id.as_deref().filter(|v| !v.is_empty()) {
            self.id = id.to_string();
        }

        let mut out = Decoded::default();
        let mut delta = Delta::default();
        let mut tool_calls = Vec::new();
        let candidate = resp.candidates.as_ref().and_then(|c| c.first());
        let parts = candidate.and_then(|c| c.content.as_ref()).map(|c| c.parts.as_slice()).unwrap_or_default();

        for part in parts {
            if let Some(sig) = part.thought_signature.as_deref().filter(|s| !s.is_empty() && !is_placeholder_signature(s)) {
                out.signatures.push(sig.to_string());
            }
            if let Some(fc) = &part.function_call {
                let args = fc.args.as_ref().map_or_else(|| "{}".to_string(), Value::to_string);
                tool_calls.push(ToolCallDelta {
                    index: self.next_tool_index,
                    id: Some(fc.id.clone().filter(|id| !id.is_empty()).unwrap_or_else(generate_call_id)),
                    r#type: Some("function".to_string()),
                    function: Some(FunctionCallDelta { name: Some(fc.name.clone()), arguments: Some(args) }),
                });
                self.next_tool_index += 1;
            } else if let Some(text) = part.text.as_deref().filter(|t| !t.is_empty()) {
                let target = if part.is_thought() { &mut delta.reasoning_content } else { &mut delta.content };
                target.get_or_insert_with(String::new).push_str(text);
            }
        }
        if !tool_calls.is_empty() {
            delta.tool_calls = Some(tool_calls);
        }

        let finish_reason = candidate.and_then(|c| c.finish_reason.as_deref()).map(|reason| {
            if self.next_tool_index > 0 {
                "tool_calls".to_string()
            } else {
                finish_from_gemini(reason).to_string()
            }
        });
        let usage = resp.usage_metadata.map(|u| {
            Usage::new(u.prompt_token_count.unwrap_or_default(), u.candidates_token_count.unwrap_or_default())
        });

        let has_delta = delta.content.is_some() || delta.reasoning_content.is_some() || delta.tool_calls.is_some();
        if has_delta || finish_reason.is_some() || usage.is_some() {
            if !self.role_sent {
                delta.role = Some("assistant".to_string());
                self.role_sent = true;
            }
            out.chunks.push(ChatCompletionChunk {
                id: self.id.clone(),
                object: "chat.completion.chunk".to_string(),
                created: self.created,
                model: self.model.clone(),
                choices: vec![ChunkChoice { index: 0, delta, finish_reason }],
                usage,
            });
        }
        Ok(out)
    }
}
