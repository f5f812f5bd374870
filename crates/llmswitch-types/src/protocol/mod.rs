//! Wire types for the non-canonical protocols.
//!
//! OpenAI Chat is the canonical shape and lives in [`crate::models::canonical`];
//! this module holds the Anthropic Messages and Gemini generateContent shapes.

pub mod claude;
pub mod gemini;
