//! Error and debug sinks.
//!
//! Both are injected into the pipeline by the embedder. The error sink sees
//! every conversion error before it is returned; the debug sink sees each
//! payload before and after every filter stage.

use llmswitch_types::{ConversionError, ErrorKind, Protocol, Stage};
use serde::Serialize;
use serde_json::Value;

/// One conversion error, attributed to a protocol and provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolErrorReport {
    pub kind: ErrorKind,
    pub protocol: Protocol,
    pub provider_type: Option<String>,
    pub details: String,
}

impl ProtocolErrorReport {
    pub fn from_error(err: &ConversionError, provider_type: Option<&str>) -> Self {
        Self {
            kind: err.kind(),
            protocol: err.protocol(),
            provider_type: provider_type.map(str::to_string),
            details: err.to_string(),
        }
    }
}

pub trait ErrorSink: Send + Sync {
    fn report(&self, report: &ProtocolErrorReport);
}

/// Logs reports through `tracing`. Used when no sink is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, report: &ProtocolErrorReport) {
        tracing::error!(
            "[HubPipeline] {} on {} (provider={}): {}",
            report.kind,
            report.protocol,
            report.provider_type.as_deref().unwrap_or("-"),
            report.details
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StagePhase {
    Before,
    After,
}

/// Snapshot of a payload around one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageEvent {
    pub request_id: String,
    pub stage: Stage,
    pub phase: StagePhase,
    pub payload: Value,
}

pub trait DebugSink: Send + Sync {
    /// Failures are logged and otherwise ignored.
    fn record(&self, event: &StageEvent) -> Result<(), String>;
}

/// A no-op debug sink
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDebugSink;

impl DebugSink for NoopDebugSink {
    fn record(&self, _event: &StageEvent) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_error() {
        let err = ConversionError::malformed_response(Protocol::OpenAI, "missing choices");
        let report = ProtocolErrorReport::from_error(&err, Some("openai-compatible"));
        assert_eq!(report.kind, ErrorKind::MalformedResponse);
        assert_eq!(report.protocol, Protocol::OpenAI);
        assert_eq!(report.provider_type.as_deref(), Some("openai-compatible"));
        assert!(report.details.contains("missing choices"));
    }
}
