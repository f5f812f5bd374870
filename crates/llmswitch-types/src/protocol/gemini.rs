//! Gemini generateContent API wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inner generateContent request (without the agent envelope).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiRequest {
    /// Conversation turns.
    #[serde(default)]
    pub contents: Vec<GeminiContent>,
    /// System prompt.
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Tool groups; function tools live in `functionDeclarations`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
    /// Function calling mode.
    #[serde(rename = "toolConfig", skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<Value>,
    /// Sampling parameters.
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<Value>,
    /// Remaining fields (safetySettings, cachedContent, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Gemini content structure containing role and parts.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GeminiContent {
    /// The role of the content author (`user` or `model`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// The parts that make up this content.
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A single part within Gemini content.
///
/// Parts can contain text, function calls, function responses, or inline data.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GeminiPart {
    /// Optional text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Whether this is a thought/reasoning part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    /// Signature for thought verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "thoughtSignature", alias = "thought_signature")]
    pub thought_signature: Option<String>,
    /// Function call request from the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "functionCall")]
    pub function_call: Option<GeminiFunctionCall>,
    /// Response to a function call.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "functionResponse")]
    pub function_response: Option<GeminiFunctionResponse>,
    /// Inline binary data (images, audio, etc.).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "inlineData")]
    pub inline_data: Option<InlineData>,
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Default::default() }
    }

    pub fn is_thought(&self) -> bool {
        self.thought.unwrap_or(false)
    }
}

/// Function call request from the Gemini model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiFunctionCall {
    /// Name of the function to call.
    pub name: String,
    /// Optional unique identifier for this call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Optional arguments to pass to the function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// Response to a function call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiFunctionResponse {
    /// Name of the function that was called.
    pub name: String,
    /// The response data from the function.
    #[serde(default)]
    pub response: Value,
    /// Optional identifier matching the original call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Inline binary data with MIME type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InlineData {
    /// MIME type of the data (e.g., "image/png").
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Base64-encoded binary data.
    pub data: String,
}

/// Tool group. Non-function tools (googleSearch, codeExecution) are kept in `other`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiTool {
    #[serde(rename = "functionDeclarations", skip_serializing_if = "Option::is_none")]
    pub function_declarations: Option<Vec<FunctionDeclaration>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Response from the Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiResponse {
    /// List of response candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<Candidate>>,
    /// Token usage metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "usageMetadata")]
    pub usage_metadata: Option<UsageMetadata>,
    /// Version of the model that generated this response.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "modelVersion")]
    pub model_version: Option<String>,
    /// Unique identifier for this response.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "responseId")]
    pub response_id: Option<String>,
}

/// A single candidate response from Gemini.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Candidate {
    /// The content of this candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<GeminiContent>,
    /// Reason why generation finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
    /// Index of this candidate in the list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Token usage metadata from Gemini API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UsageMetadata {
    /// Number of tokens in the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "promptTokenCount")]
    pub prompt_token_count: Option<u32>,
    /// Number of tokens in the response candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "candidatesTokenCount")]
    pub candidates_token_count: Option<u32>,
    /// Total token count (prompt + candidates).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "totalTokenCount")]
    pub total_token_count: Option<u32>,
}
