//! Streaming translation.
//!
//! Upstream SSE bytes are decoded incrementally, turned into canonical
//! chunks, governed like non-streamed responses and re-rendered for the
//! client protocol. Tool-call argument deltas are accumulated by index;
//! [`StreamTranslator::snapshot`] folds what the client was sent into a
//! non-streamed response.

mod accumulator;
mod anthropic;
mod gemini;
mod governor;
mod sse;
mod upstream;

use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use llmswitch_types::models::{CanonicalResponse, ChatCompletionChunk};
use llmswitch_types::{ConversionError, Protocol};

use super::codec::CodecRegistry;
use super::filters::SessionBinding;
use super::signature_cache::SignatureCache;
use super::HubResult;

pub use accumulator::{StreamAccumulator, ToolCallAccumulator};
pub use anthropic::{AnthropicStreamState, BlockType};
pub use gemini::GeminiStreamState;
pub use governor::StreamGovernance;
pub use sse::{data_frame, event_frame, SseDecoder, SseEvent, DONE_FRAME, MAX_BUFFER_SIZE};

use governor::StreamGovernor;
use upstream::ChunkDecoder;

/// Where streamed `thoughtSignature` values are stored.
#[derive(Debug, Clone)]
pub struct SignatureCapture {
    pub cache: Arc<SignatureCache>,
    pub session: SessionBinding,
    pub account_id: Option<String>,
}

#[derive(Debug)]
enum Downstream {
    OpenAI,
    Anthropic(AnthropicStreamState),
    Gemini(GeminiStreamState),
}

impl Downstream {
    fn process_chunk(&mut self, chunk: &ChatCompletionChunk) -> Vec<Bytes> {
        match self {
            Self::OpenAI => match serde_json::to_value(chunk) {
                Ok(value) => vec![data_frame(&value)],
                Err(e) => {
                    tracing::warn!("[Streaming] Failed to serialize chunk: {}", e);
                    Vec::new()
                }
            },
            Self::Anthropic(state) => state.process_chunk(chunk),
            Self::Gemini(state) => state.process_chunk(chunk),
        }
    }

    fn finish(&mut self) -> Vec<Bytes> {
        match self {
            Self::OpenAI => vec![Bytes::from_static(DONE_FRAME.as_bytes())],
            Self::Anthropic(state) => state.emit_finish(),
            Self::Gemini(state) => state.emit_finish(),
        }
    }
}

#[derive(Debug)]
enum Mode {
    /// Decode upstream chunks, govern them and re-render them for the client.
    Translate { decoder: ChunkDecoder, governor: StreamGovernor, downstream: Downstream },
    /// Anthropic or Gemini on both ends: frames are forwarded untouched so
    /// block and part signatures survive; the decoder, when present, only
    /// feeds the accumulator and signature capture.
    Passthrough { decoder: Option<ChunkDecoder> },
}

/// Incremental SSE translator for one streamed response.
#[derive(Debug)]
pub struct StreamTranslator {
    source: Protocol,
    target: Protocol,
    sse: SseDecoder,
    mode: Mode,
    accumulator: StreamAccumulator,
    capture: Option<SignatureCapture>,
    finished: bool,
}

impl StreamTranslator {
    /// `source` is the client protocol, `target` the provider's.
    pub fn new(source: Protocol, target: Protocol, model: &str) -> HubResult<Self> {
        CodecRegistry::lookup(source, target)?;
        let mode = if source == target && target != Protocol::OpenAI {
            Mode::Passthrough { decoder: ChunkDecoder::for_protocol(target, model) }
        } else {
            let decoder = ChunkDecoder::for_protocol(target, model)
                .ok_or(ConversionError::UnsupportedRoute { from: source, to: target })?;
            let downstream = match source {
                Protocol::OpenAI => Downstream::OpenAI,
                Protocol::Anthropic => Downstream::Anthropic(AnthropicStreamState::new(model)),
                Protocol::Gemini => Downstream::Gemini(GeminiStreamState::new(model)),
            };
            Mode::Translate { decoder, governor: StreamGovernor::new(StreamGovernance::default()), downstream }
        };
        Ok(Self {
            source,
            target,
            sse: SseDecoder::new(target),
            mode,
            accumulator: StreamAccumulator::default(),
            capture: None,
            finished: false,
        })
    }

    pub fn with_signature_capture(mut self, capture: Option<SignatureCapture>) -> Self {
        self.capture = capture.filter(|_| self.target.requires_signatures());
        self
    }

    /// Registry and switches for translated streams; the default accepts any
    /// well-formed call with stripping and harvesting on.
    pub fn with_governance(mut self, governance: StreamGovernance) -> Self {
        if let Mode::Translate { governor, .. } = &mut self.mode {
            *governor = StreamGovernor::new(governance);
        }
        self
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw upstream bytes; returns client frames ready to send.
    pub fn push(&mut self, bytes: &[u8]) -> HubResult<Vec<Bytes>> {
        let events = self.sse.push(bytes)?;
        let mut out = Vec::new();
        for event in events {
            out.extend(self.handle_event(&event)?);
        }
        Ok(out)
    }

    /// End of upstream input: flush buffered events and close the client stream.
    pub fn finish(&mut self) -> HubResult<Vec<Bytes>> {
        let events = self.sse.finish()?;
        let mut out = Vec::new();
        for event in events {
            out.extend(self.handle_event(&event)?);
        }
        out.extend(self.finalize());
        Ok(out)
    }

    /// What the client has been sent so far as a non-streamed response.
    pub fn snapshot(&self) -> CanonicalResponse {
        self.accumulator.to_response()
    }

    fn handle_event(&mut self, event: &SseEvent) -> HubResult<Vec<Bytes>> {
        if self.finished {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        let decoder = match &mut self.mode {
            Mode::Translate { decoder, .. } => Some(decoder),
            Mode::Passthrough { decoder } => {
                out.push(raw_frame(event));
                decoder.as_mut()
            }
        };
        let Some(decoder) = decoder else {
            return Ok(out);
        };

        let decoded = decoder.decode(event)?;
        if let Some(capture) = &self.capture {
            let min_len = capture.cache.min_signature_length();
            for signature in decoded.signatures.iter().filter(|s| s.len() >= min_len) {
                capture.cache.put(
                    &capture.session.key,
                    signature,
                    capture.session.message_count,
                    capture.account_id.as_deref(),
                );
            }
        }
        for chunk in &decoded.chunks {
            match &mut self.mode {
                Mode::Translate { governor, downstream, .. } => {
                    if let Some(governed) = governor.process(chunk) {
                        self.accumulator.apply(&governed);
                        out.extend(downstream.process_chunk(&governed));
                    }
                }
                Mode::Passthrough { .. } => self.accumulator.apply(chunk),
            }
        }
        if decoded.done {
            out.extend(self.finalize());
        }
        Ok(out)
    }

    fn finalize(&mut self) -> Vec<Bytes> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut out = Vec::new();
        if let Mode::Translate { governor, downstream, .. } = &mut self.mode {
            for chunk in governor.finish() {
                self.accumulator.apply(&chunk);
                out.extend(downstream.process_chunk(&chunk));
            }
            out.extend(downstream.finish());
        }
        tracing::debug!(
            "[Streaming] {} <- {} stream finished ({} tool call(s) sent)",
            self.source,
            self.target,
            self.accumulator.tools.len()
        );
        out
    }
}

fn raw_frame(event: &SseEvent) -> Bytes {
    let mut frame = String::with_capacity(event.data.len() + 16);
    if let Some(name) = &event.event {
        frame.push_str("event: ");
        frame.push_str(name);
        frame.push('\n');
    }
    for line in event.data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    Bytes::from(frame)
}

/// Adapts an upstream byte stream into a stream of client frames.
///
/// An upstream error or a decode failure ends the stream with that error.
/// No task is spawned; dropping the returned stream stops the work.
pub fn translate_stream<S, E>(
    mut translator: StreamTranslator,
    upstream: S,
) -> Pin<Box<dyn Stream<Item = HubResult<Bytes>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    use async_stream::stream;
    use futures::StreamExt;

    Box::pin(stream! {
        let mut upstream = Box::pin(upstream);
        while let Some(item) = upstream.next().await {
            let frames = match item {
                Ok(chunk) => translator.push(&chunk),
                Err(e) => Err(ConversionError::sse_decode(translator.target, format!("upstream stream error: {}", e))),
            };
            match frames {
                Ok(frames) => {
                    for frame in frames {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    tracing::error!("[Streaming] {}", e);
                    yield Err(e);
                    return;
                }
            }
        }
        match translator.finish() {
            Ok(frames) => {
                for frame in frames {
                    yield Ok(frame);
                }
            }
            Err(e) => yield Err(e),
        }
    })
}
