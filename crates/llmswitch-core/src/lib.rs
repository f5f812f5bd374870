//! # llmswitch Core
//!
//! Protocol conversion and tool-call governance for an LLM gateway.
//!
//! ## Architecture
//!
//! ```text
//! llmswitch-core/src/hub/
//! ├── codec.rs            # Codec trait + static (source, target) registry
//! ├── mappers/            # Anthropic, Gemini and OpenAI wire <-> canonical
//! ├── filters/            # staged pre/map/post filter engine
//! ├── tools/              # registry, argument repair, text markup, canonicalizer
//! ├── signature_cache/    # Gemini thoughtSignature session cache
//! ├── session_manager.rs  # session fingerprint derivation
//! ├── streaming/          # incremental SSE decode + per-protocol translation
//! ├── sinks.rs            # error/debug sink interfaces
//! └── pipeline.rs         # HubPipeline: wires everything together
//! ```
//!
//! HTTP transport, provider selection and credentials live outside this crate.
//! Callers hand the pipeline a wire payload and get back the payload to
//! forward upstream plus a [`hub::ConversionState`] used to convert the reply.

#![allow(
    clippy::wildcard_enum_match_arm,
    reason = "Wire payloads use wildcards for forward compatibility"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(clippy::implicit_clone, reason = "Explicit .clone() vs .to_string() is stylistic")]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::unwrap_used,
        clippy::needless_collect,
        clippy::assertions_on_result_states
    )
)]

pub mod error;
pub mod hub;
pub mod modules;

// Re-export commonly used types
pub use error::{AppError, AppResult};
pub use hub::{ConversionState, HubPipeline, HubPipelineBuilder, PreparedRequest, SessionMetadata};
pub use llmswitch_types::{ConversionError, HubConfig, Protocol, Stage};
