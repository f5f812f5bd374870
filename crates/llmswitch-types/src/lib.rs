//! # llmswitch Types
//!
//! Core types, models, and error definitions for the llmswitch hub.
//!
//! This crate provides the foundational type system shared by every stage of
//! the conversion pipeline:
//!
//! - **`error`** - Typed error hierarchy for conversion and configuration
//! - **`models`** - Canonical chat models and hub configuration
//! - **`protocol`** - Anthropic Messages and Gemini generateContent wire types
//!
//! ## Architecture Role
//!
//! `llmswitch-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!                llmswitch-types (this crate)
//!                        │
//!                        ▼
//!                 llmswitch-core
//!   (codecs, filters, tool governance, signature cache)
//!                        │
//!                        ▼
//!          embedding gateway / HTTP server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde, since every payload crosses a wire boundary
//! - **Clone** for cheap sharing between pipeline stages
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;
pub mod protocol;

// Re-export error types for convenience
pub use error::{ConfigError, ConversionError, ErrorKind, Result, TypedError};

// Re-export core model types
pub use models::{
    CanonicalMessage, CanonicalRequest, CanonicalResponse, FunctionCall, GeminiEnvelopeConfig,
    HubConfig, MessageContent, Protocol, SignatureCacheConfig, Stage, ToolCall, ToolDefinition,
    ToolGovernanceConfig,
};
