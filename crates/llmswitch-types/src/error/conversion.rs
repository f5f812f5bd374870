//! Protocol conversion errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::Protocol;

/// Errors raised while converting a payload between wire protocols.
///
/// Every variant carries the protocol whose payload violated the contract so
/// an error sink can attribute it without re-deriving the route.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConversionError {
    /// Tool calls and tool results do not pair up (orphan result, unknown id)
    #[error("Tool protocol violation ({protocol}): {message}")]
    ToolProtocol { protocol: Protocol, message: String },

    /// A streamed frame could not be decoded
    #[error("SSE decode error ({protocol}): {message}")]
    SseDecode { protocol: Protocol, message: String },

    /// Provider response is missing mandatory structure (no choices, error body)
    #[error("Malformed response ({protocol}): {message}")]
    MalformedResponse { protocol: Protocol, message: String },

    /// Inbound request does not deserialize into the expected wire shape
    #[error("Malformed request ({protocol}): {message}")]
    MalformedRequest { protocol: Protocol, message: String },

    /// A payload failed validation inside a filter
    #[error("Validation failed ({protocol}): {message}")]
    Validation { protocol: Protocol, message: String },

    /// No codec is registered for the requested source/target pair
    #[error("No codec registered for {from} -> {to}")]
    UnsupportedRoute { from: Protocol, to: Protocol },
}

/// Discriminant of [`ConversionError`], used for error-sink reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolProtocol,
    SseDecode,
    MalformedResponse,
    MalformedRequest,
    Validation,
    UnsupportedRoute,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ToolProtocol => "tool_protocol_error",
            Self::SseDecode => "sse_decode_error",
            Self::MalformedResponse => "malformed_response",
            Self::MalformedRequest => "malformed_request",
            Self::Validation => "validation_error",
            Self::UnsupportedRoute => "unsupported_route",
        };
        f.write_str(s)
    }
}

impl ConversionError {
    pub fn tool_protocol(protocol: Protocol, message: impl Into<String>) -> Self {
        Self::ToolProtocol { protocol, message: message.into() }
    }

    pub fn sse_decode(protocol: Protocol, message: impl Into<String>) -> Self {
        Self::SseDecode { protocol, message: message.into() }
    }

    pub fn malformed_response(protocol: Protocol, message: impl Into<String>) -> Self {
        Self::MalformedResponse { protocol, message: message.into() }
    }

    pub fn malformed_request(protocol: Protocol, message: impl Into<String>) -> Self {
        Self::MalformedRequest { protocol, message: message.into() }
    }

    pub fn validation(protocol: Protocol, message: impl Into<String>) -> Self {
        Self::Validation { protocol, message: message.into() }
    }

    /// Kind discriminant for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ToolProtocol { .. } => ErrorKind::ToolProtocol,
            Self::SseDecode { .. } => ErrorKind::SseDecode,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::MalformedRequest { .. } => ErrorKind::MalformedRequest,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::UnsupportedRoute { .. } => ErrorKind::UnsupportedRoute,
        }
    }

    /// Protocol whose payload triggered the error.
    ///
    /// For an unsupported route this is the target protocol.
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::ToolProtocol { protocol, .. }
            | Self::SseDecode { protocol, .. }
            | Self::MalformedResponse { protocol, .. }
            | Self::MalformedRequest { protocol, .. }
            | Self::Validation { protocol, .. } => *protocol,
            Self::UnsupportedRoute { to, .. } => *to,
        }
    }

    /// Check if the error was caused by the upstream provider rather than the caller.
    pub fn is_upstream_fault(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. } | Self::SseDecode { .. })
    }
}
