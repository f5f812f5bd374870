//! Anthropic Messages API wire types.

use serde::{Deserialize, Serialize};

/// Request body for Claude Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeRequest {
    /// Model identifier to use for completion.
    pub model: String,
    /// List of messages in the conversation.
    pub messages: Vec<ClaudeMessage>,
    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    /// Optional list of tools available to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ClaudeTool>>,
    /// Tool selection policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ClaudeToolChoice>,
    /// Whether to stream the response.
    #[serde(default)]
    pub stream: bool,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0 to 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-p nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Top-k sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Client-provided stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Extended thinking configuration, passed through opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<serde_json::Value>,
    /// Request metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// System prompt that can be a string or structured blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Simple string system prompt.
    String(String),
    /// Array of structured system blocks.
    Array(Vec<SystemBlock>),
}

impl SystemPrompt {
    /// Text blocks joined with a blank line.
    pub fn text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Array(blocks) => blocks
                .iter()
                .filter(|b| b.block_type == "text")
                .map(|b| b.text.as_str())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// A structured block within a system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    /// Block type (e.g., "text").
    #[serde(rename = "type")]
    pub block_type: String,
    /// Text content of the block.
    #[serde(default)]
    pub text: String,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessage {
    /// Role of the message author (`user` or `assistant`).
    pub role: String,
    /// Content of the message.
    pub content: ClaudeMessageContent,
}

/// Message content that can be a string or array of content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeMessageContent {
    /// Simple string content.
    String(String),
    /// Array of content blocks.
    Array(Vec<ContentBlock>),
}

/// Content block types for Claude API messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text content block.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },

    /// Thinking/reasoning content block (extended thinking feature).
    #[serde(rename = "thinking")]
    Thinking {
        /// The thinking/reasoning text.
        thinking: String,
        /// Optional cryptographic signature for verification.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Redacted thinking block (content hidden for safety).
    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        /// Opaque data representing redacted content.
        data: String,
    },

    /// Image content block.
    #[serde(rename = "image")]
    Image {
        /// The image source.
        source: ImageSource,
    },

    /// Tool use request from the model.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Unique identifier for this tool use.
        id: String,
        /// Name of the tool being called.
        name: String,
        /// Input arguments for the tool.
        #[serde(default)]
        input: serde_json::Value,
    },

    /// Result from a tool execution.
    ///
    /// Clients disagree on the id field name; the first present of
    /// `tool_call_id`, `call_id`, `tool_use_id`, `id` is authoritative.
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// The result content from the tool.
        #[serde(default)]
        content: serde_json::Value,
        /// Whether the tool execution resulted in an error.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// Block types that carry nothing translatable.
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    /// Build a tool result keyed by `tool_use_id`.
    pub fn tool_result(tool_use_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self::ToolResult {
            tool_use_id: Some(tool_use_id.into()),
            tool_call_id: None,
            call_id: None,
            id: None,
            content,
            is_error: None,
        }
    }

    /// Sets `is_error` on a tool result block; other blocks are unchanged.
    pub fn with_error_flag(mut self, flag: Option<bool>) -> Self {
        if let Self::ToolResult { is_error, .. } = &mut self {
            *is_error = flag;
        }
        self
    }

    /// Resolved call id of a tool result block.
    pub fn result_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolResult { tool_use_id, tool_call_id, call_id, id, .. } => tool_call_id
                .as_deref()
                .or(call_id.as_deref())
                .or(tool_use_id.as_deref())
                .or(id.as_deref())
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    }
}

/// Source information for image content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageSource {
    /// The source type (`base64` or `url`).
    #[serde(rename = "type")]
    pub source_type: String,
    /// MIME type of the image (e.g., "image/png").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Base64-encoded image data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Remote image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeTool {
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

/// Tool selection policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClaudeToolChoice {
    Auto,
    Any,
    None,
    Tool { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub role: String,
    pub model: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ClaudeUsage>,
}
