//! Response governance for streams.
//!
//! Text is released as it arrives until something that could open a
//! thinking wrapper or tool-call markup shows up; from there on it is held
//! until the upstream finishes. Tool-call deltas, the finish reason and usage
//! are always held. At the end the held text is stripped and harvested, every
//! call goes through the registry, and the outcome is replayed as closing
//! chunks, so a streamed response is governed like a non-streamed one.

use std::fmt;
use std::mem;
use std::sync::Arc;

use llmswitch_types::models::{
    CanonicalMessage, CanonicalResponse, ChatCompletionChunk, ChunkChoice, Delta, FunctionCallDelta, MessageContent,
    ToolCallDelta, Usage,
};
use llmswitch_types::ToolGovernanceConfig;

use super::accumulator::ToolCallAccumulator;
use crate::hub::tools::{
    harvest_validated, should_harvest, strip_thinking_tags, PermissiveToolRegistry, ToolCanonicalizer, ToolRegistry,
};

/// Lowercase; matched against lowercased text.
const TOOL_MARKERS: [&str; 4] = ["<tool_call", "<arg_key", "<function=", "*** begin patch"];
const THINKING_MARKERS: [&str; 5] = ["<think", "</think", "```thinking", "[thinking]", "[/thinking]"];

/// Registry and switches a stream is governed with.
#[derive(Clone)]
pub struct StreamGovernance {
    registry: Arc<dyn ToolRegistry>,
    strip_thinking: bool,
    harvest: bool,
}

impl StreamGovernance {
    pub fn new(registry: Arc<dyn ToolRegistry>, config: &ToolGovernanceConfig) -> Self {
        Self { registry, strip_thinking: config.strip_thinking_tags, harvest: config.harvest_text_tool_calls }
    }

    fn markers(&self) -> Vec<&'static str> {
        let mut markers = Vec::new();
        if self.harvest {
            markers.extend(TOOL_MARKERS);
        }
        if self.strip_thinking {
            markers.extend(THINKING_MARKERS);
        }
        markers
    }
}

impl Default for StreamGovernance {
    fn default() -> Self {
        Self::new(Arc::new(PermissiveToolRegistry), &ToolGovernanceConfig::default())
    }
}

impl fmt::Debug for StreamGovernance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamGovernance")
            .field("strip_thinking", &self.strip_thinking)
            .field("harvest", &self.harvest)
            .finish_non_exhaustive()
    }
}

/// One text channel (content or reasoning).
#[derive(Debug, Default)]
struct HeldText {
    pending: String,
    /// A whole marker was seen; nothing more is released.
    holding: bool,
}

impl HeldText {
    /// Appends `text` and returns what can be sent now.
    fn push(&mut self, text: &str, markers: &[&str]) -> String {
        self.pending.push_str(text);
        if self.holding {
            return String::new();
        }
        match hold_point(&self.pending, markers) {
            None => mem::take(&mut self.pending),
            Some((at, complete)) => {
                self.holding = complete;
                self.pending.drain(..at).collect()
            }
        }
    }

    fn take(&mut self) -> String {
        self.holding = false;
        mem::take(&mut self.pending)
    }
}

/// Byte offset from which `text` must be held, and whether a whole marker
/// starts there rather than a possible marker prefix at the very end.
fn hold_point(text: &str, markers: &[&str]) -> Option<(usize, bool)> {
    if markers.is_empty() {
        return None;
    }
    let lower = text.to_ascii_lowercase();
    let complete = markers.iter().filter_map(|m| lower.find(m)).min();

    let longest = markers.iter().map(|m| m.len()).max().unwrap_or(0);
    let partial = (lower.len().saturating_sub(longest)..lower.len())
        .filter(|&i| lower.is_char_boundary(i))
        .find(|&i| markers.iter().any(|m| m.starts_with(&lower[i..])));

    match (complete, partial) {
        (Some(c), Some(p)) if p < c => Some((p, false)),
        (Some(c), _) => Some((c, true)),
        (None, Some(p)) => Some((p, false)),
        (None, None) => None,
    }
}

/// Sits between the chunk decoder and the client renderer.
#[derive(Debug)]
pub(super) struct StreamGovernor {
    policy: StreamGovernance,
    markers: Vec<&'static str>,
    id: String,
    model: String,
    created: i64,
    content: HeldText,
    reasoning: HeldText,
    calls: ToolCallAccumulator,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl StreamGovernor {
    pub(super) fn new(policy: StreamGovernance) -> Self {
        let markers = policy.markers();
        Self {
            policy,
            markers,
            id: String::new(),
            model: String::new(),
            created: 0,
            content: HeldText::default(),
            reasoning: HeldText::default(),
            calls: ToolCallAccumulator::new(),
            finish_reason: None,
            usage: None,
        }
    }

    /// The releasable part of an upstream chunk, if any.
    pub(super) fn process(&mut self, chunk: &ChatCompletionChunk) -> Option<ChatCompletionChunk> {
        if self.id.is_empty() {
            self.id = chunk.id.clone();
        }
        if self.model.is_empty() {
            self.model = chunk.model.clone();
        }
        if self.created == 0 {
            self.created = chunk.created;
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let mut delta = Delta::default();
        for choice in &chunk.choices {
            let upstream = &choice.delta;
            if delta.role.is_none() {
                delta.role = upstream.role.clone();
            }
            if let Some(text) = &upstream.reasoning_content {
                append(&mut delta.reasoning_content, self.reasoning.push(text, &self.markers));
            }
            if let Some(text) = &upstream.content {
                append(&mut delta.content, self.content.push(text, &self.markers));
            }
            for call in upstream.tool_calls.iter().flatten() {
                self.calls.apply(call);
            }
            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }

        if delta == Delta::default() {
            return None;
        }
        Some(self.chunk(delta, None, None))
    }

    /// Governs what was held back and returns the closing chunks.
    pub(super) fn finish(&mut self) -> Vec<ChatCompletionChunk> {
        let mut content = self.content.take();
        let mut reasoning = self.reasoning.take();
        if self.policy.strip_thinking {
            content = strip_thinking_tags(&content);
            reasoning = strip_thinking_tags(&reasoning);
        }

        let structured = self.calls.finalize();
        let mut message = CanonicalMessage {
            role: "assistant".to_string(),
            content: Some(MessageContent::Text(content)),
            reasoning_content: Some(reasoning),
            tool_calls: (!structured.is_empty()).then_some(structured),
            ..Default::default()
        };
        let mut finish_reason = self.finish_reason.take();

        if self.policy.harvest && should_harvest(&message, finish_reason.as_deref()) {
            let harvested = harvest_validated(&mut message, self.policy.registry.as_ref());
            if harvested > 0 {
                tracing::debug!("[Streaming] Harvested {} tool call(s) from streamed text", harvested);
                finish_reason = Some("tool_calls".to_string());
            }
        }

        let mut resp = CanonicalResponse::new(self.id.clone(), self.model.clone(), self.created, message);
        resp.choices[0].finish_reason = finish_reason;
        ToolCanonicalizer::new(self.policy.registry.as_ref()).canonicalize_response(&mut resp);
        let Some(choice) = resp.choices.pop() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let tail = Delta {
            content: Some(choice.message.text()).filter(|t| !t.is_empty()),
            reasoning_content: choice.message.reasoning_content.clone().filter(|t| !t.is_empty()),
            ..Default::default()
        };
        if tail != Delta::default() {
            out.push(self.chunk(tail, None, None));
        }

        let calls: Vec<ToolCallDelta> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .zip(0u32..)
            .map(|(call, index)| ToolCallDelta {
                index,
                id: Some(call.id),
                r#type: Some("function".to_string()),
                function: Some(FunctionCallDelta {
                    name: Some(call.function.name),
                    arguments: Some(call.function.arguments),
                }),
            })
            .collect();
        let closing = Delta { tool_calls: (!calls.is_empty()).then_some(calls), ..Default::default() };
        let usage = self.usage.take();
        if closing != Delta::default() || choice.finish_reason.is_some() || usage.is_some() {
            out.push(self.chunk(closing, choice.finish_reason, usage));
        }
        out
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<String>, usage: Option<Usage>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice { index: 0, delta, finish_reason }],
            usage,
        }
    }
}

fn append(slot: &mut Option<String>, released: String) {
    if released.is_empty() {
        return;
    }
    match slot {
        Some(text) => text.push_str(&released),
        None => *slot = Some(released),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<&'static str> {
        StreamGovernance::default().markers()
    }

    #[test]
    fn test_plain_text_is_released_at_once() {
        let mut held = HeldText::default();
        assert_eq!(held.push("Hello, world", &markers()), "Hello, world");
        assert!(held.take().is_empty());
    }

    #[test]
    fn test_possible_marker_prefix_waits_for_more_text() {
        let mut held = HeldText::default();
        assert_eq!(held.push("a < b and <to", &markers()), "a < b and ");
        assert_eq!(held.push("ken>", &markers()), "<token>");
    }

    #[test]
    fn test_whole_marker_holds_the_rest_of_the_stream() {
        let mut held = HeldText::default();
        assert_eq!(held.push("Sure. <TOOL_CALL>{\"name\"", &markers()), "Sure. ");
        assert_eq!(held.push(": \"echo\"}</tool_call> more", &markers()), "");
        assert_eq!(held.take(), "<TOOL_CALL>{\"name\": \"echo\"}</tool_call> more");
    }

    #[test]
    fn test_no_markers_when_governance_is_off() {
        let config = ToolGovernanceConfig {
            harvest_text_tool_calls: false,
            strip_thinking_tags: false,
            ..Default::default()
        };
        let policy = StreamGovernance::new(Arc::new(PermissiveToolRegistry), &config);
        let mut held = HeldText::default();
        assert_eq!(held.push("<think>x</think>", &policy.markers()), "<think>x</think>");
    }

    #[test]
    fn test_hold_point_respects_char_boundaries() {
        assert_eq!(hold_point("请列出<", &markers()), Some(("请列出".len(), false)));
        assert_eq!(hold_point("请列出当前目录", &markers()), None);
    }
}
