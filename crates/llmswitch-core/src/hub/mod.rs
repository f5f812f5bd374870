//! Hub: protocol conversion and tool-call governance.

pub mod codec;
pub mod common;
pub mod filters;
pub mod mappers;
pub mod pipeline;
pub mod session_manager;
pub mod signature_cache;
pub mod sinks;
pub mod streaming;
pub mod tools;

use llmswitch_types::ConversionError;

pub type HubResult<T> = Result<T, ConversionError>;

pub use codec::{Codec, CodecContext, CodecRegistry};
pub use filters::{Filter, FilterContext, FilterEngine, SessionBinding};
pub use pipeline::{ConversionState, HubPipeline, HubPipelineBuilder, PreparedRequest, SessionMetadata};
pub use session_manager::SessionManager;
pub use signature_cache::SignatureCache;
pub use sinks::{DebugSink, ErrorSink, NoopDebugSink, ProtocolErrorReport, StageEvent, StagePhase, TracingErrorSink};
pub use streaming::{translate_stream, StreamGovernance, StreamTranslator};
pub use tools::{ToolCanonicalizer, ToolRegistry};
