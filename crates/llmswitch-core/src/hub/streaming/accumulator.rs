//! Folds streamed chunks back into a complete response.

use std::collections::BTreeMap;

use llmswitch_types::models::{
    CanonicalMessage, CanonicalResponse, ChatCompletionChunk, MessageContent, ToolCall, ToolCallDelta, Usage,
};

use crate::hub::common::generate_call_id;
use crate::hub::tools::arguments::{normalize_argument_text, parse_or_repair};
use crate::hub::tools::infer_tool_name;

#[derive(Debug, Clone, Default)]
struct PartialCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Collects tool-call deltas by index.
///
/// Argument fragments are concatenated as they arrive; nothing is parsed
/// until [`finalize`](Self::finalize).
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, delta: &ToolCallDelta) {
        let entry = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            entry.id = Some(id.to_string());
        }
        if let Some(function) = &delta.function {
            if let Some(name) = function.name.as_deref().filter(|n| !n.is_empty()) {
                entry.name = Some(name.to_string());
            }
            if let Some(fragment) = &function.arguments {
                entry.arguments.push_str(fragment);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Completed calls in index order.
    ///
    /// Arguments go through the same repair as non-streamed responses; a call
    /// whose arguments cannot be repaired, or whose name cannot be recovered,
    /// is dropped.
    pub fn finalize(&self) -> Vec<ToolCall> {
        let mut out = Vec::with_capacity(self.calls.len());
        for (index, partial) in &self.calls {
            let arguments = match normalize_argument_text(&partial.arguments) {
                Ok(args) => args,
                Err(e) => {
                    tracing::warn!("[Streaming] Dropping tool call #{}: {}", index, e);
                    continue;
                }
            };
            let name = match partial.name.clone() {
                Some(name) => name,
                None => {
                    let inferred = parse_or_repair(&serde_json::Value::String(arguments.clone()))
                        .ok()
                        .and_then(|args| infer_tool_name(&args));
                    match inferred {
                        Some(name) => name.to_string(),
                        None => {
                            tracing::warn!("[Streaming] Dropping nameless tool call #{}", index);
                            continue;
                        }
                    }
                }
            };
            let id = partial.id.clone().unwrap_or_else(generate_call_id);
            out.push(ToolCall::new(id, name, arguments));
        }
        out
    }
}

/// Running totals of a streamed completion.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    pub id: Option<String>,
    pub model: Option<String>,
    pub created: i64,
    pub content: String,
    pub reasoning: String,
    pub tools: ToolCallAccumulator,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl StreamAccumulator {
    pub fn apply(&mut self, chunk: &ChatCompletionChunk) {
        if self.id.is_none() && !chunk.id.is_empty() {
            self.id = Some(chunk.id.clone());
        }
        if self.model.is_none() && !chunk.model.is_empty() {
            self.model = Some(chunk.model.clone());
        }
        if self.created == 0 {
            self.created = chunk.created;
        }
        if let Some(usage) = &chunk.usage {
            self.usage = Some(*usage);
        }
        for choice in &chunk.choices {
            let delta = &choice.delta;
            if let Some(text) = &delta.content {
                self.content.push_str(text);
            }
            if let Some(text) = &delta.reasoning_content {
                self.reasoning.push_str(text);
            }
            for call in delta.tool_calls.iter().flatten() {
                self.tools.apply(call);
            }
            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }
    }

    /// The completion as a non-streamed response.
    pub fn to_response(&self) -> CanonicalResponse {
        let calls = self.tools.finalize();
        let has_calls = !calls.is_empty();
        let message = CanonicalMessage {
            role: "assistant".to_string(),
            content: if has_calls && self.content.trim().is_empty() {
                None
            } else {
                Some(MessageContent::Text(self.content.clone()))
            },
            reasoning_content: (!self.reasoning.is_empty()).then(|| self.reasoning.clone()),
            tool_calls: has_calls.then_some(calls),
            ..Default::default()
        };

        let mut resp = CanonicalResponse::new(
            self.id.clone().unwrap_or_default(),
            self.model.clone().unwrap_or_default(),
            self.created,
            message,
        );
        resp.choices[0].finish_reason = if has_calls {
            Some("tool_calls".to_string())
        } else {
            self.finish_reason.clone().filter(|r| r != "tool_calls").or_else(|| Some("stop".to_string()))
        };
        resp.usage = self.usage;
        resp
    }
}
