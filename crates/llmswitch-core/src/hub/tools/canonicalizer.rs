//! Tool-call canonicalizer.
//!
//! Enforces the tool-call invariants on canonical payloads:
//!
//! - every call has a name (inferred from argument shape when missing)
//! - arguments are a JSON object rendered as text
//! - calls the [`ToolRegistry`] rejects are dropped (response side)
//! - adjacent duplicate calls collapse into one
//! - every surviving call has an id
//! - an assistant message with calls and blank text carries `null` content
//! - `finish_reason` is `tool_calls` exactly when calls survive
//!
//! Text harvesting happens earlier in the response_map filters; see
//! [`harvest_message`], which those filters call.

use std::collections::HashSet;

use llmswitch_types::models::{CanonicalMessage, CanonicalRequest, CanonicalResponse, ContentPart, MessageContent, ToolCall};
use serde_json::Value;

use super::arguments::{normalize_argument_text, parse_or_repair};
use super::inference::infer_tool_name;
use super::registry::ToolRegistry;
use super::text_markup::{extract_tool_calls, has_tool_markup};
use crate::hub::common::generate_call_id;

/// Which side of the exchange a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Request,
    Response,
}

/// A call removed during canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedCall {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// What a canonicalization pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalizeReport {
    pub dropped: Vec<DroppedCall>,
    pub deduplicated: usize,
    pub ids_assigned: usize,
    pub lifted_parts: usize,
    pub orphaned_results_removed: usize,
}

impl CanonicalizeReport {
    pub fn is_noop(&self) -> bool {
        self == &Self::default()
    }
}

pub struct ToolCanonicalizer<'a> {
    registry: &'a dyn ToolRegistry,
}

impl<'a> ToolCanonicalizer<'a> {
    pub fn new(registry: &'a dyn ToolRegistry) -> Self {
        Self { registry }
    }

    /// Request side: lift inline tool parts, normalize assistant calls, drop
    /// results that answered a dropped call.
    ///
    /// History is not re-validated against the registry; an argument string
    /// that cannot be repaired is kept verbatim.
    pub fn canonicalize_request(&self, req: &mut CanonicalRequest) -> CanonicalizeReport {
        let mut report = CanonicalizeReport::default();
        report.lifted_parts = lift_inline_tool_parts(&mut req.messages);

        for msg in req.messages.iter_mut().filter(|m| m.role == "assistant") {
            let Some(calls) = msg.tool_calls.take() else {
                continue;
            };
            let kept = self.govern_calls(calls, Side::Request, &mut report);
            msg.tool_calls = if kept.is_empty() { None } else { Some(kept) };
            apply_content_invariant(msg);
        }

        let dropped_ids: HashSet<&str> =
            report.dropped.iter().map(|d| d.id.as_str()).filter(|id| !id.is_empty()).collect();
        if !dropped_ids.is_empty() {
            let before = req.messages.len();
            req.messages.retain(|m| {
                !(m.role == "tool" && m.tool_call_id.as_deref().is_some_and(|id| dropped_ids.contains(id)))
            });
            report.orphaned_results_removed = before - req.messages.len();
        }

        if !report.is_noop() {
            tracing::debug!("[ToolCanonicalizer] Request normalized: {:?}", report);
        }
        report
    }

    /// Response side: validate, dedupe and id every call, then fix content and finish reason.
    pub fn canonicalize_response(&self, resp: &mut CanonicalResponse) -> CanonicalizeReport {
        let mut report = CanonicalizeReport::default();

        for choice in &mut resp.choices {
            let had_calls = choice.message.has_tool_calls();
            if let Some(calls) = choice.message.tool_calls.take() {
                let kept = self.govern_calls(calls, Side::Response, &mut report);
                choice.message.tool_calls = if kept.is_empty() { None } else { Some(kept) };
            }
            apply_content_invariant(&mut choice.message);

            if choice.message.has_tool_calls() {
                choice.finish_reason = Some("tool_calls".to_string());
            } else if had_calls || choice.finish_reason.as_deref() == Some("tool_calls") {
                choice.finish_reason = Some("stop".to_string());
            }
        }

        for dropped in &report.dropped {
            tracing::warn!(
                "[ToolCanonicalizer] Dropped tool call '{}' ({}): {}",
                dropped.name,
                dropped.id,
                dropped.reason
            );
        }
        report
    }

    fn govern_calls(&self, calls: Vec<ToolCall>, side: Side, report: &mut CanonicalizeReport) -> Vec<ToolCall> {
        let mut kept: Vec<ToolCall> = Vec::with_capacity(calls.len());

        for mut call in calls {
            let parsed = parse_or_repair(&Value::String(call.function.arguments.clone()));

            if call.function.name.trim().is_empty() {
                match parsed.as_ref().ok().and_then(infer_tool_name) {
                    Some(inferred) => {
                        tracing::debug!("[ToolCanonicalizer] Inferred tool name '{}'", inferred);
                        call.function.name = inferred.to_string();
                    }
                    None => {
                        report.dropped.push(dropped(&call, "missing tool name"));
                        continue;
                    }
                }
            }
            call.function.name = call.function.name.trim().to_string();

            match side {
                Side::Request => match normalize_argument_text(&call.function.arguments) {
                    Ok(normalized) => call.function.arguments = normalized,
                    Err(e) => tracing::warn!(
                        "[ToolCanonicalizer] Keeping unrepairable arguments of '{}' verbatim: {}",
                        call.function.name,
                        e
                    ),
                },
                Side::Response => {
                    if let Err(e) = parsed {
                        report.dropped.push(dropped(&call, &e.to_string()));
                        continue;
                    }
                    let verdict = self.registry.validate_tool_call(&call.function.name, &call.function.arguments);
                    if !verdict.ok {
                        let reason = verdict.reason.unwrap_or_else(|| "rejected by registry".to_string());
                        report.dropped.push(dropped(&call, &reason));
                        continue;
                    }
                    if let Some(normalized) = verdict.normalized_args {
                        call.function.arguments = normalized;
                    }
                }
            }

            if kept.last().is_some_and(|prev| is_duplicate(prev, &call)) {
                report.deduplicated += 1;
                continue;
            }
            kept.push(call);
        }

        for call in &mut kept {
            if call.id.trim().is_empty() {
                call.id = generate_call_id();
                report.ids_assigned += 1;
            }
        }
        kept
    }
}

fn dropped(call: &ToolCall, reason: &str) -> DroppedCall {
    DroppedCall { id: call.id.clone(), name: call.function.name.clone(), reason: reason.to_string() }
}

/// Adjacent duplicates: same non-empty id, or same name and arguments when either id is missing.
pub fn is_duplicate(a: &ToolCall, b: &ToolCall) -> bool {
    let a_id = a.id.trim();
    let b_id = b.id.trim();
    if !a_id.is_empty() && !b_id.is_empty() {
        return a_id == b_id;
    }
    a.function.name == b.function.name && a.function.arguments == b.function.arguments
}

/// Assistant message with calls and blank text gets `null` content.
pub fn apply_content_invariant(msg: &mut CanonicalMessage) {
    if msg.role == "assistant" && msg.has_tool_calls() && msg.text().trim().is_empty() {
        let has_non_text_parts = matches!(
            &msg.content,
            Some(MessageContent::Parts(parts)) if parts.iter().any(|p| !matches!(p, ContentPart::Text { .. }))
        );
        if !has_non_text_parts {
            msg.content = None;
        }
    }
}

/// Whether a response message qualifies for text harvesting.
pub fn should_harvest(msg: &CanonicalMessage, finish_reason: Option<&str>) -> bool {
    if msg.has_tool_calls() {
        return false;
    }
    match finish_reason {
        Some("tool_calls") => true,
        Some("stop") => {
            has_tool_markup(&msg.text())
                || msg.reasoning_content.as_deref().is_some_and(has_tool_markup)
        }
        _ => false,
    }
}

/// Recover tool calls written as text into `tool_calls`.
///
/// Returns the number of calls harvested. Text is taken from `content` first,
/// then `reasoning_content`; harvested `content` is cleared to `""`.
pub fn harvest_message(msg: &mut CanonicalMessage) -> usize {
    let from_content = extract_tool_calls(&msg.text());
    let (calls, clear_content) = match from_content {
        Some(calls) => (calls, true),
        None => match msg.reasoning_content.as_deref().and_then(extract_tool_calls) {
            Some(calls) => (calls, false),
            None => return 0,
        },
    };

    let harvested: Vec<ToolCall> = calls
        .into_iter()
        .map(|c| ToolCall::new(String::new(), c.name, Value::Object(c.arguments).to_string()))
        .collect();
    let count = harvested.len();

    if clear_content {
        msg.content = Some(MessageContent::Text(String::new()));
    }
    msg.tool_calls = Some(harvested);
    count
}

/// [`harvest_message`], keeping only calls `registry` accepts.
///
/// When no harvested call survives the message is left exactly as it was,
/// so the client still sees the original text.
pub fn harvest_validated(msg: &mut CanonicalMessage, registry: &dyn ToolRegistry) -> usize {
    let mut candidate = msg.clone();
    if harvest_message(&mut candidate) == 0 {
        return 0;
    }

    let harvested = candidate.tool_calls.take().unwrap_or_default();
    let total = harvested.len();
    let kept: Vec<ToolCall> = harvested
        .into_iter()
        .filter_map(|mut call| {
            let verdict = registry.validate_tool_call(&call.function.name, &call.function.arguments);
            if !verdict.ok {
                tracing::debug!(
                    "[ToolCanonicalizer] Harvested call '{}' rejected: {}",
                    call.function.name,
                    verdict.reason.as_deref().unwrap_or("rejected by registry")
                );
                return None;
            }
            if let Some(normalized) = verdict.normalized_args {
                call.function.arguments = normalized;
            }
            Some(call)
        })
        .collect();

    if kept.is_empty() {
        tracing::warn!("[ToolCanonicalizer] None of {} harvested call(s) is valid, keeping text", total);
        return 0;
    }
    let count = kept.len();
    candidate.tool_calls = Some(kept);
    *msg = candidate;
    count
}

/// Move inline `tool_use` / `tool_result` parts into `tool_calls` and `tool` messages.
fn lift_inline_tool_parts(messages: &mut Vec<CanonicalMessage>) -> usize {
    let needs_lift = messages.iter().any(|m| {
        matches!(&m.content, Some(MessageContent::Parts(parts))
            if parts.iter().any(|p| matches!(p, ContentPart::ToolUse { .. } | ContentPart::ToolResult { .. })))
    });
    if !needs_lift {
        return 0;
    }

    let mut lifted = 0;
    let mut out = Vec::with_capacity(messages.len() + 2);
    for mut msg in messages.drain(..) {
        let Some(MessageContent::Parts(parts)) = msg.content.take() else {
            out.push(msg);
            continue;
        };

        let mut kept_parts = Vec::with_capacity(parts.len());
        let mut results = Vec::new();
        for part in parts {
            match part {
                ContentPart::ToolUse { id, name, input } => {
                    let args = if input.is_null() { "{}".to_string() } else { input.to_string() };
                    msg.tool_calls.get_or_insert_with(Vec::new).push(ToolCall::new(id, name, args));
                    lifted += 1;
                }
                ContentPart::ToolResult { tool_call_id, content, is_error } => {
                    let result = CanonicalMessage::tool_result(tool_call_id, value_to_text(&content));
                    results.push(result.with_error_flag(is_error));
                    lifted += 1;
                }
                other => kept_parts.push(other),
            }
        }

        msg.content = if kept_parts.is_empty() { None } else { Some(MessageContent::Parts(kept_parts)) };
        // a user turn that only carried results disappears
        let keep_msg = msg.content.is_some() || msg.has_tool_calls() || results.is_empty();
        if keep_msg && !results.is_empty() {
            // results answer the previous assistant turn, so they go first
            out.extend(results);
            out.push(msg);
        } else {
            if keep_msg {
                out.push(msg);
            }
            out.extend(results);
        }
    }
    *messages = out;
    lifted
}

/// Text rendering of a tool result payload.
pub fn value_to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let texts: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str).or_else(|| item.as_str()))
                .collect();
            if texts.len() == items.len() {
                texts.join("\n")
            } else {
                v.to_string()
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "canonicalizer_tests.rs"]
mod tests;
