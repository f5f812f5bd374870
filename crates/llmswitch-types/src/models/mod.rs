//! Domain models for the hub.
//!
//! This module contains the core models shared by every pipeline stage:
//! - Canonical chat request/response/chunk shapes
//! - Hub configuration (signature cache, tool governance, Gemini envelope)

pub mod canonical;
pub mod config;

pub use canonical::{
    CanonicalMessage, CanonicalRequest, CanonicalResponse, ChatCompletionChunk, Choice,
    ChunkChoice, ContentPart, Delta, FunctionCall, FunctionCallDelta, FunctionDefinition,
    ImageUrl, MessageContent, ToolCall, ToolCallDelta, ToolDefinition, Usage,
};
pub use config::{
    GeminiEnvelopeConfig, HubConfig, Protocol, SignatureCacheConfig, Stage, ToolGovernanceConfig,
};
