//! Anthropic Messages <-> canonical.

mod request;
mod response;
#[cfg(test)]
mod tests;

pub use request::{decode_request, encode_request, stop_list, DEFAULT_MAX_TOKENS};
pub use response::{
    decode_response, encode_response, finish_from_stop_reason, stop_reason_from_finish, to_claude_usage,
};
