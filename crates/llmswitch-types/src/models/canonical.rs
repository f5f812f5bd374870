//! Canonical chat models.
//!
//! The hub converts every inbound payload into this shape before the map
//! stage runs. It follows the OpenAI Chat Completions wire format so the
//! OpenAI codec is a near-identity and the other codecs have a single
//! well-known target.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chat completion request in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CanonicalRequest {
    /// Model identifier. Empty when the wire protocol carries it out of band.
    #[serde(default)]
    pub model: String,
    /// Conversation messages, system messages first.
    #[serde(default)]
    pub messages: Vec<CanonicalMessage>,
    /// Tool definitions available to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// `"auto"`, `"none"`, `"required"` or `{"type":"function","function":{"name":..}}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Whether the client asked for a streamed response.
    #[serde(default, skip_serializing_if = "is_false")]
    pub stream: bool,
    /// Sampling and limit parameters carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalRequest {
    pub fn new(model: impl Into<String>, messages: Vec<CanonicalMessage>) -> Self {
        Self { model: model.into(), messages, ..Default::default() }
    }

    /// Concatenated text of the leading system messages, if any.
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<String> = self
            .messages
            .iter()
            .take_while(|m| m.role == "system")
            .map(CanonicalMessage::text)
            .filter(|t| !t.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Declared tools, empty slice when none.
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        self.tools.as_deref().unwrap_or_default()
    }

    pub fn has_tools(&self) -> bool {
        !self.tool_definitions().is_empty()
    }
}

/// Single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CanonicalMessage {
    /// `system`, `user`, `assistant` or `tool`.
    pub role: String,
    /// Text or content parts. Serialized as `null` when absent.
    #[serde(default)]
    pub content: Option<MessageContent>,
    /// Reasoning text emitted by thinking models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Tool calls issued by an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call id answered by a `tool` message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Function name for `tool` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A `tool` message reports a failed call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CanonicalMessage {
    pub fn text_message(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(text.into())),
            ..Default::default()
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(MessageContent::Text(content.into())),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }

    pub fn with_error_flag(mut self, is_error: Option<bool>) -> Self {
        self.is_error = is_error;
        self
    }

    /// Concatenated text content; image and tool parts are skipped.
    pub fn text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(MessageContent::Text(s)) => s.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.calls().is_empty()
    }
}

/// Message content: a plain string or typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Typed content part.
///
/// `tool_use` and `tool_result` parts are accepted from clients that embed
/// them inline; the canonicalizer lifts them into `tool_calls` and `tool`
/// messages before encoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_call_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Part types the hub does not translate.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Tool call issued by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ToolCall {
    /// Call identifier; empty until one is assigned.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_function_type")]
    pub r#type: String,
    pub function: FunctionCall,
    /// Gemini `thoughtSignature` of the originating `functionCall` part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            r#type: default_function_type(),
            function: FunctionCall { name: name.into(), arguments: arguments.into() },
            thought_signature: None,
        }
    }

    /// Keeps `signature` unless it is empty.
    pub fn with_thought_signature(mut self, signature: Option<String>) -> Self {
        self.thought_signature = signature.filter(|s| !s.is_empty());
        self
    }
}

/// Function name plus JSON-encoded arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    /// Always a JSON document rendered as text once normalized.
    #[serde(default)]
    pub arguments: String,
}

/// Tool made available to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "default_function_type")]
    pub r#type: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: Option<String>, parameters: Value) -> Self {
        Self {
            r#type: default_function_type(),
            function: FunctionDefinition { name: name.into(), description, parameters },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the arguments object.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
}

/// Non-streaming chat completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_completion_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl CanonicalResponse {
    pub fn new(id: impl Into<String>, model: impl Into<String>, created: i64, message: CanonicalMessage) -> Self {
        Self {
            id: id.into(),
            object: default_completion_object(),
            created,
            model: model.into(),
            choices: vec![Choice { index: 0, message, finish_reason: None }],
            usage: None,
        }
    }

    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: CanonicalMessage,
    pub finish_reason: Option<String>,
}

/// Token accounting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0
    }
}

/// Streamed chat completion chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_chunk_object")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Fragment of a tool call; fragments sharing an `index` belong together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FunctionCallDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

fn default_function_type() -> String {
    "function".to_string()
}

fn default_completion_object() -> String {
    "chat.completion".to_string()
}

fn default_chunk_object() -> String {
    "chat.completion.chunk".to_string()
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if signature")]
fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_keeps_extra_fields() {
        let raw = json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.2,
            "max_tokens": 64
        });
        let req: CanonicalRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.extra.get("max_tokens"), Some(&json!(64)));

        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["temperature"], json!(0.2));
        assert!(back.get("stream").is_none());
    }

    #[test]
    fn test_system_text_only_reads_leading_messages() {
        let req = CanonicalRequest::new(
            "m",
            vec![
                CanonicalMessage::text_message("system", "be brief"),
                CanonicalMessage::text_message("user", "hello"),
                CanonicalMessage::text_message("system", "late system"),
            ],
        );
        assert_eq!(req.system_text().as_deref(), Some("be brief"));
    }

    #[test]
    fn test_assistant_null_content_serializes_as_null() {
        let msg = CanonicalMessage {
            role: "assistant".to_string(),
            tool_calls: Some(vec![ToolCall::new("call_1", "shell", "{}")]),
            ..Default::default()
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert!(v["content"].is_null());
        assert_eq!(v["tool_calls"][0]["type"], "function");
    }

    #[test]
    fn test_unknown_content_part_is_tolerated() {
        let raw = json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "look"},
                {"type": "input_audio", "input_audio": {"data": "..."}}
            ]
        });
        let msg: CanonicalMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.text(), "look");
    }

    #[test]
    fn test_usage_total() {
        let u = Usage::new(10, 5);
        assert_eq!(u.total_tokens, 15);
        assert!(!u.is_empty());
        assert!(Usage::default().is_empty());
    }
}
