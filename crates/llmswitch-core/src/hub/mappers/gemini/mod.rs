//! Gemini `generateContent` <-> canonical, plus the envelope used by the
//! `request`-scoped upstream.

mod request;
mod response;
#[cfg(test)]
mod tests;
pub mod wrapper;

pub use request::{decode_request, encode_request};
pub use response::{decode_response, encode_response, finish_from_gemini, gemini_from_finish};
pub use wrapper::{unwrap_request, unwrap_response, wrap_request};

/// Signature values clients send to bypass validation; never real signatures.
pub const PLACEHOLDER_SIGNATURES: &[&str] = &["skip_thought_signature_validator", "context_engineering_is_the_way_to_go"];

pub fn is_placeholder_signature(signature: &str) -> bool {
    PLACEHOLDER_SIGNATURES.contains(&signature)
}
