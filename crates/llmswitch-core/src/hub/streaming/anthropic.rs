//! Canonical chunks -> Anthropic Messages SSE.
//!
//! Event order: `message_start`, then per content block
//! `content_block_start` / `content_block_delta`* / `content_block_stop`,
//! then `message_delta` with the stop reason and `message_stop`.

use bytes::Bytes;
use llmswitch_types::models::{ChatCompletionChunk, ToolCallDelta, Usage};
use serde_json::{json, Value};

use super::sse::event_frame;
use crate::hub::common::{generate_call_id, generate_random_id};
use crate::hub::mappers::claude::stop_reason_from_finish;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    None,
    Text,
    Thinking,
    Function,
}

#[derive(Debug)]
pub struct AnthropicStreamState {
    block_type: BlockType,
    block_index: usize,
    /// Upstream index of the tool call the open `Function` block belongs to.
    tool_index: Option<u32>,
    message_start_sent: bool,
    message_stop_sent: bool,
    used_tool: bool,
    finish_reason: Option<String>,
    usage: Option<Usage>,
    model: String,
}

impl AnthropicStreamState {
    pub fn new(model: &str) -> Self {
        Self {
            block_type: BlockType::None,
            block_index: 0,
            tool_index: None,
            message_start_sent: false,
            message_stop_sent: false,
            used_tool: false,
            finish_reason: None,
            usage: None,
            model: model.to_string(),
        }
    }

    pub fn current_block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn is_finished(&self) -> bool {
        self.message_stop_sent
    }

    pub fn process_chunk(&mut self, chunk: &ChatCompletionChunk) -> Vec<Bytes> {
        let mut out = Vec::new();
        if self.message_stop_sent {
            return out;
        }
        out.extend(self.emit_message_start(chunk));
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        for choice in &chunk.choices {
            let delta = &choice.delta;
            if let Some(text) = delta.reasoning_content.as_deref().filter(|t| !t.is_empty()) {
                if self.block_type != BlockType::Thinking {
                    out.extend(self.start_block(BlockType::Thinking, json!({"type": "thinking", "thinking": ""})));
                }
                out.push(self.emit_delta("thinking_delta", json!({"thinking": text})));
            }
            if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
                if self.block_type != BlockType::Text {
                    out.extend(self.start_block(BlockType::Text, json!({"type": "text", "text": ""})));
                }
                out.push(self.emit_delta("text_delta", json!({"text": text})));
            }
            for call in delta.tool_calls.iter().flatten() {
                out.extend(self.process_tool_delta(call));
            }
            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }
        out
    }

    fn process_tool_delta(&mut self, call: &ToolCallDelta) -> Vec<Bytes> {
        let mut out = Vec::new();
        let same_call = self.block_type == BlockType::Function && self.tool_index == Some(call.index);
        if !same_call {
            let name = call.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default();
            let id = call.id.clone().filter(|id| !id.is_empty()).unwrap_or_else(generate_call_id);
            out.extend(self.start_block(
                BlockType::Function,
                json!({"type": "tool_use", "id": id, "name": name, "input": {}}),
            ));
            self.tool_index = Some(call.index);
            self.used_tool = true;
        }
        if let Some(fragment) = call.function.as_ref().and_then(|f| f.arguments.as_deref()).filter(|a| !a.is_empty()) {
            out.push(self.emit_delta("input_json_delta", json!({"partial_json": fragment})));
        }
        out
    }

    /// Closes the open block and ends the message. Safe to call more than once.
    pub fn emit_finish(&mut self) -> Vec<Bytes> {
        if self.message_stop_sent {
            return Vec::new();
        }
        let mut out = Vec::new();
        if !self.message_start_sent {
            let model = self.model.clone();
            out.push(self.message_start(&format!("msg_{}", generate_random_id()), &model));
        }
        let was_inside_block = self.block_type != BlockType::None;
        out.extend(self.end_block());

        let stop_reason = if self.used_tool {
            "tool_use"
        } else {
            match self.finish_reason.as_deref() {
                Some(reason) => stop_reason_from_finish(reason).unwrap_or("end_turn"),
                None if was_inside_block => {
                    tracing::warn!("[Streaming] Stream ended without finish_reason inside an open block");
                    "max_tokens"
                }
                None => "end_turn",
            }
        };
        let usage = self.usage.unwrap_or_default();
        out.push(self.emit(
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": {"stop_reason": stop_reason, "stop_sequence": null},
                "usage": {"input_tokens": usage.prompt_tokens, "output_tokens": usage.completion_tokens}
            }),
        ));
        out.push(self.emit("message_stop", json!({"type": "message_stop"})));
        self.message_stop_sent = true;
        out
    }

    fn emit(&self, event_type: &str, data: Value) -> Bytes {
        event_frame(event_type, &data)
    }

    fn emit_message_start(&mut self, chunk: &ChatCompletionChunk) -> Option<Bytes> {
        if self.message_start_sent {
            return None;
        }
        let id = if chunk.id.is_empty() { format!("msg_{}", generate_random_id()) } else { chunk.id.clone() };
        let model = if chunk.model.is_empty() { self.model.clone() } else { chunk.model.clone() };
        Some(self.message_start(&id, &model))
    }

    fn message_start(&mut self, id: &str, model: &str) -> Bytes {
        self.message_start_sent = true;
        self.emit(
            "message_start",
            json!({
                "type": "message_start",
                "message": {
                    "id": id,
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": model,
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": {"input_tokens": 0, "output_tokens": 0}
                }
            }),
        )
    }

    fn start_block(&mut self, block_type: BlockType, content_block: Value) -> Vec<Bytes> {
        let mut chunks = self.end_block();
        chunks.push(self.emit(
            "content_block_start",
            json!({"type": "content_block_start", "index": self.block_index, "content_block": content_block}),
        ));
        self.block_type = block_type;
        chunks
    }

    fn end_block(&mut self) -> Vec<Bytes> {
        if self.block_type == BlockType::None {
            return Vec::new();
        }
        let chunk = self.emit("content_block_stop", json!({"type": "content_block_stop", "index": self.block_index}));
        self.block_index += 1;
        self.block_type = BlockType::None;
        self.tool_index = None;
        vec![chunk]
    }

    fn emit_delta(&self, delta_type: &str, delta_content: Value) -> Bytes {
        let mut delta = json!({"type": delta_type});
        if let (Value::Object(target), Value::Object(fields)) = (&mut delta, delta_content) {
            target.extend(fields);
        }
        self.emit("content_block_delta", json!({"type": "content_block_delta", "index": self.block_index, "delta": delta}))
    }
}
