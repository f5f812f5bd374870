//! Staged filter engine.
//!
//! A filter is a named, idempotent transform registered at one [`Stage`].
//! `*_pre` filters see the wire payload entering the pipeline, `*_map`
//! filters the canonical shape, `*_post` filters the wire payload leaving
//! it. The engine runs a stage's filters in registration order and stops at
//! the first error.

mod request;
mod response;
mod signature;

use std::fmt;
use std::sync::Arc;

use llmswitch_types::{Protocol, Stage};
use serde_json::Value;

use super::sinks::{DebugSink, StageEvent, StagePhase};
use super::tools::ToolRegistry;
use super::HubResult;

pub use request::{PruneToolSchema, StringifyToolArguments, ToolChoiceDefault, ToolResultPairing};
pub use response::{FinishReasonInvariant, HarvestTextToolCalls, RepairToolArguments, StripThinkingTags};
pub use signature::{GeminiSignatureCapture, GeminiSignatureInject};

/// Session the request is bound to for signature bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    /// `sid-<16 hex>` cache key, after cross-session resolution.
    pub key: String,
    /// Message count of the inbound request.
    pub message_count: usize,
}

/// Per-request data every filter can read.
#[derive(Clone)]
pub struct FilterContext {
    pub request_id: String,
    pub model: String,
    pub endpoint: String,
    /// Codec profile of the route, e.g. `anthropic-gemini`.
    pub profile: String,
    pub stage: Stage,
    pub source: Protocol,
    pub target: Protocol,
    pub session: Option<SessionBinding>,
    pub account_id: Option<String>,
    pub debug_sink: Option<Arc<dyn DebugSink>>,
    /// Registry for the request's declared tools; response stages only.
    pub registry: Option<Arc<dyn ToolRegistry>>,
}

impl FilterContext {
    pub fn new(request_id: impl Into<String>, source: Protocol, target: Protocol, profile: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            model: String::new(),
            endpoint: String::new(),
            profile: profile.into(),
            stage: Stage::RequestPre,
            source,
            target,
            session: None,
            account_id: None,
            debug_sink: None,
            registry: None,
        }
    }

    /// Copy of this context positioned at `stage`.
    pub fn at(&self, stage: Stage) -> Self {
        Self { stage, ..self.clone() }
    }

    /// Protocol of the payload at the current stage.
    pub fn wire_protocol(&self) -> Protocol {
        match self.stage {
            Stage::RequestPre | Stage::ResponsePost => self.source,
            Stage::RequestPost | Stage::ResponsePre => self.target,
            Stage::RequestMap | Stage::ResponseMap => Protocol::OpenAI,
        }
    }
}

impl fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("request_id", &self.request_id)
            .field("model", &self.model)
            .field("profile", &self.profile)
            .field("stage", &self.stage)
            .field("session", &self.session)
            .field("debug_sink", &self.debug_sink.is_some())
            .finish()
    }
}

pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;
    fn stage(&self) -> Stage;
    fn apply(&self, payload: Value, ctx: &FilterContext) -> HubResult<Value>;
}

/// Ordered filter list. Holds no per-request state.
#[derive(Clone, Default)]
pub struct FilterEngine {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, filter: Arc<dyn Filter>) {
        tracing::debug!("[FilterEngine] Registered '{}' at {}", filter.name(), filter.stage());
        self.filters.push(filter);
    }

    pub fn filters_for(&self, stage: Stage) -> impl Iterator<Item = &Arc<dyn Filter>> + '_ {
        self.filters.iter().filter(move |f| f.stage() == stage)
    }

    pub fn names_for(&self, stage: Stage) -> Vec<&'static str> {
        self.filters_for(stage).map(|f| f.name()).collect()
    }

    /// Run every filter registered at `ctx.stage`.
    pub fn run(&self, payload: Value, ctx: &FilterContext) -> HubResult<Value> {
        record(ctx, StagePhase::Before, &payload);
        let mut payload = payload;
        for filter in self.filters_for(ctx.stage) {
            payload = filter.apply(payload, ctx).inspect_err(|e| {
                tracing::warn!("[FilterEngine] '{}' failed at {}: {}", filter.name(), ctx.stage, e);
            })?;
            tracing::trace!("[FilterEngine] '{}' applied at {}", filter.name(), ctx.stage);
        }
        record(ctx, StagePhase::After, &payload);
        Ok(payload)
    }
}

impl fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.filters.iter().map(|f| format!("{}:{}", f.stage(), f.name())).collect();
        f.debug_struct("FilterEngine").field("filters", &names).finish()
    }
}

fn record(ctx: &FilterContext, phase: StagePhase, payload: &Value) {
    let Some(sink) = &ctx.debug_sink else {
        return;
    };
    let event = StageEvent { request_id: ctx.request_id.clone(), stage: ctx.stage, phase, payload: payload.clone() };
    if let Err(e) = sink.record(&event) {
        tracing::warn!("[FilterEngine] Debug sink failed at {} ({:?}): {}", ctx.stage, phase, e);
    }
}
