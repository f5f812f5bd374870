//! Configuration enums for protocols and pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// API protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// OpenAI ChatCompletions API format.
    #[default]
    #[serde(alias = "openai-chat")]
    OpenAI,
    /// Anthropic Claude Messages API format.
    #[serde(alias = "claude")]
    Anthropic,
    /// Google Gemini GenerateContent API format.
    Gemini,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OpenAI => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl Protocol {
    /// Parse from string.
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "openai-chat" => Some(Self::OpenAI),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Whether the provider requires thought signatures echoed back on tool calls.
    pub fn requires_signatures(self) -> bool {
        matches!(self, Self::Gemini)
    }
}

/// Filter pipeline stage.
///
/// `*_pre` stages see the wire shape entering the pipeline, `*_map` stages
/// the canonical shape and `*_post` stages the wire shape leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RequestPre,
    RequestMap,
    RequestPost,
    ResponsePre,
    ResponseMap,
    ResponsePost,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 6] = [
        Self::RequestPre,
        Self::RequestMap,
        Self::RequestPost,
        Self::ResponsePre,
        Self::ResponseMap,
        Self::ResponsePost,
    ];

    pub fn is_request(self) -> bool {
        matches!(self, Self::RequestPre | Self::RequestMap | Self::RequestPost)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::RequestPre => write!(f, "request_pre"),
            Self::RequestMap => write!(f, "request_map"),
            Self::RequestPost => write!(f, "request_post"),
            Self::ResponsePre => write!(f, "response_pre"),
            Self::ResponseMap => write!(f, "response_map"),
            Self::ResponsePost => write!(f, "response_post"),
        }
    }
}
