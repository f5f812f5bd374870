//! Codecs and the static route registry.
//!
//! A codec is chosen by the `(source, target)` protocol pair of a route and
//! never by inspecting the payload. Request path: `decode_request` turns the
//! client's wire payload into the canonical request, `encode_request` renders
//! it for the provider. Response path: `decode_response` reads the
//! provider's reply, `encode_response` renders it for the client.

use llmswitch_types::models::{CanonicalRequest, CanonicalResponse};
use llmswitch_types::{ConversionError, GeminiEnvelopeConfig, Protocol};
use serde_json::Value;

use super::mappers::{claude, gemini, openai};
use super::HubResult;

/// Per-call inputs a codec cannot derive from the payload.
#[derive(Debug, Clone, Copy)]
pub struct CodecContext<'a> {
    /// Model the request targets (Gemini carries it out of band).
    pub model: &'a str,
    pub gemini: &'a GeminiEnvelopeConfig,
}

pub trait Codec: Send + Sync {
    /// Route identifier, e.g. `anthropic-openai`.
    fn profile(&self) -> &'static str;
    fn source(&self) -> Protocol;
    fn target(&self) -> Protocol;

    /// Whether the target needs `thoughtSignature` bookkeeping.
    fn signature_family(&self) -> bool {
        self.target().requires_signatures()
    }

    fn decode_request(&self, payload: &Value, ctx: &CodecContext<'_>) -> HubResult<CanonicalRequest>;
    fn encode_request(&self, req: &CanonicalRequest, ctx: &CodecContext<'_>) -> HubResult<Value>;
    fn decode_response(&self, payload: &Value, ctx: &CodecContext<'_>) -> HubResult<CanonicalResponse>;
    fn encode_response(&self, resp: &CanonicalResponse, ctx: &CodecContext<'_>) -> HubResult<Value>;
}

/// Codec composed from the source protocol's mapper and the target's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteCodec {
    profile: &'static str,
    source: Protocol,
    target: Protocol,
}

impl RouteCodec {
    const fn new(profile: &'static str, source: Protocol, target: Protocol) -> Self {
        Self { profile, source, target }
    }
}

impl Codec for RouteCodec {
    fn profile(&self) -> &'static str {
        self.profile
    }

    fn source(&self) -> Protocol {
        self.source
    }

    fn target(&self) -> Protocol {
        self.target
    }

    fn decode_request(&self, payload: &Value, ctx: &CodecContext<'_>) -> HubResult<CanonicalRequest> {
        match self.source {
            Protocol::OpenAI => openai::decode_request(payload),
            Protocol::Anthropic => claude::decode_request(payload),
            Protocol::Gemini => gemini::decode_request(payload, ctx.model),
        }
    }

    fn encode_request(&self, req: &CanonicalRequest, ctx: &CodecContext<'_>) -> HubResult<Value> {
        match self.target {
            Protocol::OpenAI => openai::encode_request(req),
            Protocol::Anthropic => claude::encode_request(req),
            Protocol::Gemini => {
                let body = gemini::encode_request(req)?;
                let model = if req.model.is_empty() { ctx.model } else { req.model.as_str() };
                Ok(match ctx.gemini.envelope_project.as_deref() {
                    Some(project) => gemini::wrap_request(body, project, model, ctx.gemini),
                    None => body,
                })
            }
        }
    }

    fn decode_response(&self, payload: &Value, ctx: &CodecContext<'_>) -> HubResult<CanonicalResponse> {
        match self.target {
            Protocol::OpenAI => openai::decode_response(payload),
            Protocol::Anthropic => claude::decode_response(payload),
            Protocol::Gemini => gemini::decode_response(payload, ctx.model),
        }
    }

    fn encode_response(&self, resp: &CanonicalResponse, _ctx: &CodecContext<'_>) -> HubResult<Value> {
        match self.source {
            Protocol::OpenAI => openai::encode_response(resp),
            Protocol::Anthropic => claude::encode_response(resp),
            Protocol::Gemini => gemini::encode_response(resp),
        }
    }
}

static ROUTES: [RouteCodec; 7] = [
    RouteCodec::new("openai-passthrough", Protocol::OpenAI, Protocol::OpenAI),
    RouteCodec::new("anthropic-openai", Protocol::Anthropic, Protocol::OpenAI),
    RouteCodec::new("anthropic-passthrough", Protocol::Anthropic, Protocol::Anthropic),
    RouteCodec::new("openai-gemini", Protocol::OpenAI, Protocol::Gemini),
    RouteCodec::new("anthropic-gemini", Protocol::Anthropic, Protocol::Gemini),
    RouteCodec::new("gemini-openai", Protocol::Gemini, Protocol::OpenAI),
    RouteCodec::new("gemini-passthrough", Protocol::Gemini, Protocol::Gemini),
];

/// Static `(source, target)` -> codec table.
pub struct CodecRegistry;

impl CodecRegistry {
    pub fn lookup(source: Protocol, target: Protocol) -> HubResult<&'static dyn Codec> {
        ROUTES
            .iter()
            .find(|c| c.source == source && c.target == target)
            .map(|c| c as &'static dyn Codec)
            .ok_or(ConversionError::UnsupportedRoute { from: source, to: target })
    }

    pub fn by_profile(profile: &str) -> Option<&'static dyn Codec> {
        ROUTES.iter().find(|c| c.profile == profile).map(|c| c as &'static dyn Codec)
    }

    pub fn routes() -> impl Iterator<Item = &'static dyn Codec> {
        ROUTES.iter().map(|c| c as &'static dyn Codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmswitch_types::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_lookup_all_routes() {
        let profiles: Vec<&str> = CodecRegistry::routes().map(|c| c.profile()).collect();
        assert_eq!(profiles.len(), 7);
        for codec in CodecRegistry::routes() {
            let found = CodecRegistry::lookup(codec.source(), codec.target()).unwrap();
            assert_eq!(found.profile(), codec.profile());
        }
        assert_eq!(CodecRegistry::lookup(Protocol::Anthropic, Protocol::OpenAI).unwrap().profile(), "anthropic-openai");
    }

    #[test]
    fn test_unsupported_route() {
        let err = CodecRegistry::lookup(Protocol::OpenAI, Protocol::Anthropic).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedRoute);
    }

    #[test]
    fn test_signature_family() {
        assert!(CodecRegistry::by_profile("openai-gemini").unwrap().signature_family());
        assert!(!CodecRegistry::by_profile("anthropic-openai").unwrap().signature_family());
    }

    #[test]
    fn test_gemini_envelope_only_when_project_configured() {
        let codec = CodecRegistry::lookup(Protocol::OpenAI, Protocol::Gemini).unwrap();
        let req = CanonicalRequest::new(
            "gemini-2.5-pro",
            vec![llmswitch_types::models::CanonicalMessage::text_message("user", "hi")],
        );

        let bare_cfg = GeminiEnvelopeConfig::default();
        let ctx = CodecContext { model: "gemini-2.5-pro", gemini: &bare_cfg };
        let bare = codec.encode_request(&req, &ctx).unwrap();
        assert!(bare.get("contents").is_some());

        let cfg = GeminiEnvelopeConfig { envelope_project: Some("proj".to_string()), ..Default::default() };
        let ctx = CodecContext { model: "gemini-2.5-pro", gemini: &cfg };
        let wrapped = codec.encode_request(&req, &ctx).unwrap();
        assert_eq!(wrapped["project"], "proj");
        assert_eq!(wrapped["model"], "gemini-2.5-pro");
        assert_eq!(wrapped["request"]["contents"][0]["parts"][0]["text"], "hi");

        let reply = json!({"response": {"candidates": [{"content": {"role": "model", "parts": [{"text": "yo"}]}, "finishReason": "STOP"}]}});
        let resp = codec.decode_response(&reply, &ctx).unwrap();
        assert_eq!(resp.choices[0].message.text(), "yo");
        assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
