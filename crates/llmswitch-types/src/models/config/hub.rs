//! Hub pipeline configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
pub struct HubConfig {
    /// Gemini thoughtSignature session cache
    #[serde(default)]
    #[validate(nested)]
    pub signature_cache: SignatureCacheConfig,
    /// Tool-call governance switches
    #[serde(default)]
    #[validate(nested)]
    pub tools: ToolGovernanceConfig,
    /// Gemini request envelope
    #[serde(default)]
    #[validate(nested)]
    pub gemini: GeminiEnvelopeConfig,
}

/// Session signature cache configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct SignatureCacheConfig {
    /// Enable capture and injection of thought signatures
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Entry lifetime in seconds
    #[validate(range(min = 1_u64, max = 604_800_u64))]
    #[serde(default = "default_signature_ttl")]
    pub ttl_secs: u64,
    /// Maximum number of sessions retained
    #[validate(range(min = 1_usize))]
    #[serde(default = "default_signature_capacity")]
    pub capacity: usize,
    /// Signatures shorter than this are ignored
    #[validate(range(min = 1_usize))]
    #[serde(default = "default_min_signature_length")]
    pub min_signature_length: usize,
}

impl Default for SignatureCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_signature_ttl(),
            capacity: default_signature_capacity(),
            min_signature_length: default_min_signature_length(),
        }
    }
}

/// Tool-call governance configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Configuration struct - bools are intentional feature flags"
)]
pub struct ToolGovernanceConfig {
    /// Recover tool calls written as text markup in responses
    #[serde(default = "default_true")]
    pub harvest_text_tool_calls: bool,
    /// Strip `<think>`-style wrappers from response text
    #[serde(default = "default_true")]
    pub strip_thinking_tags: bool,
    /// Validate arguments against declared JSON schemas
    #[serde(default = "default_true")]
    pub validate_schemas: bool,
    /// Reject tool results that answer no known call
    #[serde(default = "default_true")]
    pub enforce_tool_result_pairing: bool,
}

impl Default for ToolGovernanceConfig {
    fn default() -> Self {
        Self {
            harvest_text_tool_calls: true,
            strip_thinking_tags: true,
            validate_schemas: true,
            enforce_tool_result_pairing: true,
        }
    }
}

/// Envelope wrapped around Gemini requests for agent-style endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct GeminiEnvelopeConfig {
    /// Project id; the envelope is only applied when set
    #[serde(default)]
    #[validate(length(min = 1_u64))]
    pub envelope_project: Option<String>,
    /// `userAgent` field of the envelope
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// `requestType` field of the envelope
    #[serde(default = "default_request_type")]
    pub request_type: String,
}

impl Default for GeminiEnvelopeConfig {
    fn default() -> Self {
        Self {
            envelope_project: None,
            user_agent: default_user_agent(),
            request_type: default_request_type(),
        }
    }
}

pub const fn default_true() -> bool {
    true
}

pub const fn default_signature_ttl() -> u64 {
    7200 // 2 hours
}

pub const fn default_signature_capacity() -> usize {
    1000
}

pub const fn default_min_signature_length() -> usize {
    50
}

pub fn default_user_agent() -> String {
    "antigravity".to_string()
}

pub fn default_request_type() -> String {
    "agent".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let cfg: HubConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, HubConfig::default());
        assert_eq!(cfg.signature_cache.ttl_secs, 7200);
        assert_eq!(cfg.signature_cache.min_signature_length, 50);
        assert!(cfg.tools.harvest_text_tool_calls);
        assert!(cfg.gemini.envelope_project.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_ttl() {
        let cfg: HubConfig =
            serde_json::from_str(r#"{"signature_cache": {"ttl_secs": 0}}"#).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_project() {
        let cfg: HubConfig =
            serde_json::from_str(r#"{"gemini": {"envelope_project": ""}}"#).unwrap();
        assert!(cfg.validate().is_err());
    }
}
