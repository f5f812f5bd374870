//! Canonical chunks -> Gemini `streamGenerateContent` SSE.
//!
//! Gemini streams whole function calls, so tool-call deltas are held back
//! and emitted as `functionCall` parts with the final chunk.

use bytes::Bytes;
use llmswitch_types::models::ChatCompletionChunk;
use llmswitch_types::protocol::gemini::{GeminiFunctionCall, GeminiPart};
use serde_json::{json, Value};

use super::accumulator::ToolCallAccumulator;
use super::sse::data_frame;
use crate::hub::mappers::gemini::gemini_from_finish;
use crate::hub::tools::parse_or_repair;

#[derive(Debug, Default)]
pub struct GeminiStreamState {
    tools: ToolCallAccumulator,
    finish_reason: Option<String>,
    usage: Option<Value>,
    model: String,
    finished: bool,
}

impl GeminiStreamState {
    pub fn new(model: &str) -> Self {
        Self { model: model.to_string(), ..Default::default() }
    }

    pub fn process_chunk(&mut self, chunk: &ChatCompletionChunk) -> Vec<Bytes> {
        if self.finished {
            return Vec::new();
        }
        if !chunk.model.is_empty() {
            self.model = chunk.model.clone();
        }
        if let Some(u) = chunk.usage {
            self.usage = Some(json!({
                "promptTokenCount": u.prompt_tokens,
                "candidatesTokenCount": u.completion_tokens,
                "totalTokenCount": u.total_tokens
            }));
        }

        let mut parts = Vec::new();
        for choice in &chunk.choices {
            let delta = &choice.delta;
            if let Some(text) = delta.reasoning_content.as_deref().filter(|t| !t.is_empty()) {
                parts.push(GeminiPart { text: Some(text.to_string()), thought: Some(true), ..Default::default() });
            }
            if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
                parts.push(GeminiPart::text(text));
            }
            for call in delta.tool_calls.iter().flatten() {
                self.tools.apply(call);
            }
            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }

        if parts.is_empty() {
            return Vec::new();
        }
        vec![self.frame(parts, None)]
    }

    /// Flushes buffered calls with the finish reason. Safe to call more than once.
    pub fn emit_finish(&mut self) -> Vec<Bytes> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let parts: Vec<GeminiPart> = self
            .tools
            .finalize()
            .into_iter()
            .map(|call| {
                let args = parse_or_repair(&Value::String(call.function.arguments))
                    .map(Value::Object)
                    .unwrap_or_else(|_| json!({}));
                GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        name: call.function.name,
                        id: Some(call.id),
                        args: Some(args),
                    }),
                    ..Default::default()
                }
            })
            .collect();
        let reason = gemini_from_finish(self.finish_reason.as_deref().unwrap_or("stop"));
        vec![self.frame(parts, Some(reason))]
    }

    fn frame(&self, parts: Vec<GeminiPart>, finish_reason: Option<&str>) -> Bytes {
        let mut candidate = json!({"content": {"role": "model", "parts": parts}, "index": 0});
        if let Some(reason) = finish_reason {
            candidate["finishReason"] = Value::String(reason.to_string());
        }
        let mut body = json!({"candidates": [candidate], "modelVersion": self.model});
        if let (Some(usage), Some(_)) = (&self.usage, finish_reason) {
            body["usageMetadata"] = usage.clone();
        }
        data_frame(&body)
    }
}
