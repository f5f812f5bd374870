//! Hub pipeline: wires codecs, filters, the tool canonicalizer and the
//! signature cache into the request and response paths.
//!
//! ```text
//! request:  request_pre -> decode -> request_map -> canonicalize -> encode -> request_post
//! response: response_pre -> decode -> response_map -> canonicalize -> encode -> response_post
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use llmswitch_types::models::{CanonicalRequest, CanonicalResponse, ToolDefinition};
use llmswitch_types::{ConfigError, ConversionError, HubConfig, Protocol, Stage};
use serde_json::Value;

use super::codec::{Codec, CodecContext, CodecRegistry};
use super::filters::{
    Filter, FilterContext, FilterEngine, FinishReasonInvariant, GeminiSignatureCapture, GeminiSignatureInject,
    HarvestTextToolCalls, PruneToolSchema, RepairToolArguments, SessionBinding, StringifyToolArguments,
    StripThinkingTags, ToolChoiceDefault, ToolResultPairing,
};
use super::session_manager::SessionManager;
use super::signature_cache::SignatureCache;
use super::sinks::{DebugSink, ErrorSink, ProtocolErrorReport, TracingErrorSink};
use super::streaming::{translate_stream, SignatureCapture, StreamGovernance, StreamTranslator};
use super::tools::{PermissiveToolRegistry, SchemaToolRegistry, ToolCanonicalizer, ToolRegistry};
use super::HubResult;
use crate::modules::config::validate_config;

/// Caller-supplied request metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Conversation id assigned by the client or gateway.
    pub session_id: Option<String>,
    /// Upstream account the request is routed to.
    pub account_id: Option<String>,
    /// Provider label used in error reports.
    pub provider_type: Option<String>,
    /// The client asked for a streamed response. Gemini clients signal this
    /// through the endpoint rather than the body.
    pub stream: bool,
}

/// What the response path needs to know about the request it answers.
#[derive(Debug, Clone)]
pub struct ConversionState {
    pub request_id: String,
    pub source: Protocol,
    pub target: Protocol,
    pub profile: &'static str,
    pub model: String,
    pub stream: bool,
    pub session: Option<SessionBinding>,
    pub account_id: Option<String>,
    pub provider_type: Option<String>,
    /// Tools declared on the request; the response is validated against them.
    pub tools: Vec<ToolDefinition>,
}

/// Provider-bound payload plus the state to convert its reply.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub payload: Value,
    pub state: ConversionState,
}

pub struct HubPipeline {
    config: HubConfig,
    engine: FilterEngine,
    cache: Option<Arc<SignatureCache>>,
    registry: Option<Arc<dyn ToolRegistry>>,
    error_sink: Arc<dyn ErrorSink>,
    debug_sink: Option<Arc<dyn DebugSink>>,
}

impl fmt::Debug for HubPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubPipeline")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .field("cache", &self.cache)
            .field("custom_registry", &self.registry.is_some())
            .finish()
    }
}

impl HubPipeline {
    pub fn builder() -> HubPipelineBuilder {
        HubPipelineBuilder::new()
    }

    /// Pipeline with default configuration and a fresh signature cache.
    pub fn with_defaults() -> Self {
        HubPipelineBuilder::new().assemble()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn filters(&self) -> &FilterEngine {
        &self.engine
    }

    pub fn signature_cache(&self) -> Option<&Arc<SignatureCache>> {
        self.cache.as_ref()
    }

    /// Convert a client request into the provider's wire shape.
    pub fn prepare_request(
        &self,
        source: Protocol,
        target: Protocol,
        payload: Value,
        metadata: SessionMetadata,
    ) -> HubResult<PreparedRequest> {
        let provider = metadata.provider_type.clone();
        self.prepare_inner(source, target, payload, metadata)
            .inspect_err(|e| self.report(e, provider.as_deref()))
    }

    /// Convert a provider reply into the client's wire shape.
    pub fn convert_response(&self, state: &ConversionState, payload: Value) -> HubResult<Value> {
        self.convert_inner(state, payload).inspect_err(|e| self.report(e, state.provider_type.as_deref()))
    }

    /// Translator for a streamed reply; signatures are captured like in [`convert_response`](Self::convert_response).
    pub fn stream_translator(&self, state: &ConversionState) -> HubResult<StreamTranslator> {
        let capture = match (&self.cache, &state.session) {
            (Some(cache), Some(session)) => Some(SignatureCapture {
                cache: cache.clone(),
                session: session.clone(),
                account_id: state.account_id.clone(),
            }),
            _ => None,
        };
        let governance = StreamGovernance::new(self.registry_for(&state.tools), &self.config.tools);
        StreamTranslator::new(state.source, state.target, &state.model)
            .map(|t| t.with_signature_capture(capture).with_governance(governance))
            .inspect_err(|e| self.report(e, state.provider_type.as_deref()))
    }

    /// Streamed counterpart of [`convert_response`](Self::convert_response).
    pub fn convert_stream<S, E>(
        &self,
        state: &ConversionState,
        upstream: S,
    ) -> HubResult<Pin<Box<dyn Stream<Item = HubResult<Bytes>> + Send>>>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let translator = self.stream_translator(state)?;
        Ok(translate_stream(translator, upstream))
    }

    fn prepare_inner(
        &self,
        source: Protocol,
        target: Protocol,
        payload: Value,
        metadata: SessionMetadata,
    ) -> HubResult<PreparedRequest> {
        let codec = CodecRegistry::lookup(source, target)?;
        let request_id = format!("req-{}", uuid::Uuid::new_v4().simple());
        let model_hint = model_of(&payload);
        let session = self.bind_session(codec, &payload, &metadata);

        let ctx = FilterContext {
            request_id: request_id.clone(),
            model: model_hint.clone(),
            endpoint: endpoint_for(source).to_string(),
            profile: codec.profile().to_string(),
            stage: Stage::RequestPre,
            source,
            target,
            session: session.clone(),
            account_id: metadata.account_id.clone(),
            debug_sink: self.debug_sink.clone(),
            registry: None,
        };
        tracing::debug!("[HubPipeline] {} request {} (model={})", codec.profile(), request_id, model_hint);

        let payload = self.engine.run(payload, &ctx)?;
        let codec_ctx = CodecContext { model: &model_hint, gemini: &self.config.gemini };
        let mut canonical = codec.decode_request(&payload, &codec_ctx)?;
        canonical.stream |= metadata.stream;

        let canonical = to_canonical_value(&canonical, source)?;
        let canonical = self.engine.run(canonical, &ctx.at(Stage::RequestMap))?;
        let mut canonical: CanonicalRequest = serde_json::from_value(canonical)
            .map_err(|e| ConversionError::validation(source, format!("request_map produced an invalid request: {}", e)))?;

        let registry = self.registry_for(canonical.tool_definitions());
        let report = ToolCanonicalizer::new(registry.as_ref()).canonicalize_request(&mut canonical);
        if !report.is_noop() {
            tracing::debug!("[ToolCanonicalizer] Request {}: {:?}", request_id, report);
        }

        let model = if canonical.model.is_empty() { model_hint } else { canonical.model.clone() };
        let codec_ctx = CodecContext { model: &model, gemini: &self.config.gemini };
        let wire = codec.encode_request(&canonical, &codec_ctx)?;
        let wire = self.engine.run(wire, &ctx.at(Stage::RequestPost))?;

        Ok(PreparedRequest {
            payload: wire,
            state: ConversionState {
                request_id,
                source,
                target,
                profile: codec.profile(),
                model,
                stream: canonical.stream,
                session,
                account_id: metadata.account_id,
                provider_type: metadata.provider_type,
                tools: canonical.tools.unwrap_or_default(),
            },
        })
    }

    fn convert_inner(&self, state: &ConversionState, payload: Value) -> HubResult<Value> {
        let codec = CodecRegistry::lookup(state.source, state.target)?;
        let registry = self.registry_for(&state.tools);
        let ctx = FilterContext {
            request_id: state.request_id.clone(),
            model: state.model.clone(),
            endpoint: endpoint_for(state.source).to_string(),
            profile: codec.profile().to_string(),
            stage: Stage::ResponsePre,
            source: state.source,
            target: state.target,
            session: state.session.clone(),
            account_id: state.account_id.clone(),
            debug_sink: self.debug_sink.clone(),
            registry: Some(registry.clone()),
        };

        let payload = self.engine.run(payload, &ctx)?;
        let codec_ctx = CodecContext { model: &state.model, gemini: &self.config.gemini };
        let canonical = codec.decode_response(&payload, &codec_ctx)?;

        let canonical = to_canonical_value(&canonical, state.target)?;
        let canonical = self.engine.run(canonical, &ctx.at(Stage::ResponseMap))?;
        let mut canonical: CanonicalResponse = serde_json::from_value(canonical).map_err(|e| {
            ConversionError::malformed_response(state.target, format!("response_map produced an invalid response: {}", e))
        })?;

        let report = ToolCanonicalizer::new(registry.as_ref()).canonicalize_response(&mut canonical);
        if !report.dropped.is_empty() {
            tracing::warn!("[ToolCanonicalizer] Response {} dropped {} call(s)", state.request_id, report.dropped.len());
        }

        let wire = codec.encode_response(&canonical, &codec_ctx)?;
        self.engine.run(wire, &ctx.at(Stage::ResponsePost))
    }

    fn bind_session(&self, codec: &dyn Codec, payload: &Value, metadata: &SessionMetadata) -> Option<SessionBinding> {
        let cache = self.cache.as_ref().filter(|_| codec.signature_family())?;
        let derived = SessionManager::fingerprint(codec.source(), payload, metadata.session_id.as_deref());
        let key = cache.resolve_key(metadata.account_id.as_deref(), &derived);
        Some(SessionBinding { key, message_count: SessionManager::message_count(codec.source(), payload) })
    }

    fn registry_for(&self, tools: &[ToolDefinition]) -> Arc<dyn ToolRegistry> {
        if let Some(registry) = &self.registry {
            return registry.clone();
        }
        if tools.is_empty() {
            Arc::new(PermissiveToolRegistry)
        } else {
            Arc::new(SchemaToolRegistry::from_definitions(tools, self.config.tools.validate_schemas))
        }
    }

    fn report(&self, err: &ConversionError, provider_type: Option<&str>) {
        self.error_sink.report(&ProtocolErrorReport::from_error(err, provider_type));
    }
}

fn model_of(payload: &Value) -> String {
    payload.get("model").and_then(Value::as_str).unwrap_or_default().to_string()
}

fn endpoint_for(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::OpenAI => "/v1/chat/completions",
        Protocol::Anthropic => "/v1/messages",
        Protocol::Gemini => "/v1beta/models:generateContent",
    }
}

fn to_canonical_value<T: serde::Serialize>(value: &T, protocol: Protocol) -> HubResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ConversionError::validation(protocol, format!("canonical payload is not serializable: {}", e)))
}

/// Builds a [`HubPipeline`] with the default filters plus any custom ones.
#[derive(Default)]
pub struct HubPipelineBuilder {
    config: HubConfig,
    cache: Option<Arc<SignatureCache>>,
    registry: Option<Arc<dyn ToolRegistry>>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    debug_sink: Option<Arc<dyn DebugSink>>,
    custom_filters: Vec<Arc<dyn Filter>>,
}

impl HubPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a cache between pipelines. Without one, a cache is built from the config.
    pub fn signature_cache(mut self, cache: Arc<SignatureCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the per-request schema registry.
    pub fn tool_registry(mut self, registry: Arc<dyn ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    pub fn debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    /// Append a filter after the defaults of its stage.
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.custom_filters.push(filter);
        self
    }

    pub fn build(self) -> Result<HubPipeline, ConfigError> {
        validate_config(&self.config)?;
        Ok(self.assemble())
    }

    fn assemble(self) -> HubPipeline {
        let tools = self.config.tools;

        let cache = if self.config.signature_cache.enabled {
            Some(self.cache.unwrap_or_else(|| Arc::new(SignatureCache::new(&self.config.signature_cache))))
        } else {
            None
        };

        let mut engine = FilterEngine::new();
        engine.register(Arc::new(StringifyToolArguments));
        engine.register(Arc::new(ToolChoiceDefault));
        engine.register(Arc::new(PruneToolSchema));
        if tools.enforce_tool_result_pairing {
            engine.register(Arc::new(ToolResultPairing));
        }
        if tools.strip_thinking_tags {
            engine.register(Arc::new(StripThinkingTags));
        }
        if tools.harvest_text_tool_calls {
            engine.register(Arc::new(HarvestTextToolCalls));
        }
        engine.register(Arc::new(RepairToolArguments));
        engine.register(Arc::new(FinishReasonInvariant));
        if let Some(cache) = &cache {
            engine.register(Arc::new(GeminiSignatureInject::new(cache.clone())));
            engine.register(Arc::new(GeminiSignatureCapture::new(cache.clone())));
        }
        for filter in self.custom_filters {
            engine.register(filter);
        }

        tracing::info!(
            "[HubPipeline] Built with {} filter(s), signature cache {}",
            Stage::ALL.iter().map(|s| engine.names_for(*s).len()).sum::<usize>(),
            if cache.is_some() { "enabled" } else { "disabled" }
        );

        HubPipeline {
            config: self.config,
            engine,
            cache,
            registry: self.registry,
            error_sink: self.error_sink.unwrap_or_else(|| Arc::new(TracingErrorSink)),
            debug_sink: self.debug_sink,
        }
    }
}
