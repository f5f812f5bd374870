//! Incremental Server-Sent Events decoder.

use bytes::{Bytes, BytesMut};
use llmswitch_types::{ConversionError, Protocol};
use serde_json::Value;

use crate::hub::HubResult;

/// Upper bound on buffered, not yet terminated input.
pub const MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    /// Parse `data` as JSON.
    pub fn json(&self, protocol: Protocol) -> HubResult<Value> {
        serde_json::from_str(&self.data).map_err(|e| {
            ConversionError::sse_decode(protocol, format!("invalid JSON in SSE data ({} bytes): {}", self.data.len(), e))
        })
    }
}

/// Splits a byte stream into events. Bytes may arrive cut at any offset.
#[derive(Debug)]
pub struct SseDecoder {
    protocol: Protocol,
    buffer: BytesMut,
    pending: SseEvent,
    has_fields: bool,
    data_lines: usize,
}

impl SseDecoder {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol, buffer: BytesMut::new(), pending: SseEvent::default(), has_fields: false, data_lines: 0 }
    }

    /// Feed a chunk, returning every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> HubResult<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_raw = self.buffer.split_to(pos + 1);
            let line = std::str::from_utf8(&line_raw)
                .map_err(|e| ConversionError::sse_decode(self.protocol, format!("SSE line is not UTF-8: {}", e)))?;
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        // unterminated line plus the event still being assembled
        let held = self.buffer.len() + self.pending.data.len();
        if held > MAX_BUFFER_SIZE {
            return Err(ConversionError::sse_decode(
                self.protocol,
                format!("SSE event exceeded {}MB without completing", MAX_BUFFER_SIZE / 1024 / 1024),
            ));
        }
        Ok(events)
    }

    /// End of input: dispatch whatever is still buffered.
    pub fn finish(&mut self) -> HubResult<Vec<SseEvent>> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = std::str::from_utf8(&rest)
                .map_err(|e| ConversionError::sse_decode(self.protocol, format!("SSE tail is not UTF-8: {}", e)))?
                .trim_end_matches('\r')
                .to_string();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => {
                self.pending.event = Some(value.to_string());
                self.has_fields = true;
            }
            "data" => {
                if self.data_lines > 0 {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.data_lines += 1;
                self.has_fields = true;
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_fields {
            return None;
        }
        self.has_fields = false;
        self.data_lines = 0;
        Some(std::mem::take(&mut self.pending))
    }
}

/// `data: <json>\n\n`
pub fn data_frame(value: &Value) -> Bytes {
    Bytes::from(format!("data: {}\n\n", value))
}

/// `event: <name>\ndata: <json>\n\n`
pub fn event_frame(event: &str, value: &Value) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, value))
}

pub const DONE_FRAME: &str = "data: [DONE]\n\n";
