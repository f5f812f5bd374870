// Claude request transformation (Anthropic Messages <-> canonical)

use llmswitch_types::models::{
    CanonicalMessage, CanonicalRequest, ContentPart, ImageUrl, MessageContent, ToolCall, ToolDefinition,
};
use llmswitch_types::protocol::claude::{
    ClaudeMessage, ClaudeMessageContent, ClaudeRequest, ClaudeTool, ClaudeToolChoice, ContentBlock, ImageSource,
    SystemPrompt,
};
use llmswitch_types::{ConversionError, Protocol};
use serde_json::{json, Map, Value};

use crate::hub::common::prune_schema_keyword;
use crate::hub::tools::{parse_or_repair, value_to_text};
use crate::hub::HubResult;

/// Anthropic requires `max_tokens`; used when the canonical request has none.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Messages request -> canonical.
pub fn decode_request(payload: &Value) -> HubResult<CanonicalRequest> {
    let req: ClaudeRequest = serde_json::from_value(payload.clone())
        .map_err(|e| ConversionError::malformed_request(Protocol::Anthropic, e.to_string()))?;

    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    if let Some(system) = &req.system {
        let text = system.text();
        if !text.trim().is_empty() {
            messages.push(CanonicalMessage::text_message("system", text));
        }
    }
    for msg in &req.messages {
        decode_message(msg, &mut messages);
    }

    let tools: Vec<ToolDefinition> = req.tools.iter().flatten().filter_map(decode_tool).collect();
    let tool_choice = req.tool_choice.as_ref().map(decode_tool_choice);

    let mut extra = Map::new();
    if let Some(max_tokens) = req.max_tokens {
        extra.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = req.temperature {
        extra.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = req.top_p {
        extra.insert("top_p".to_string(), json!(top_p));
    }
    if let Some(stop) = req.stop_sequences.filter(|s| !s.is_empty()) {
        extra.insert("stop".to_string(), json!(stop));
    }

    tracing::debug!(
        "[Claude-Request] Decoded {} messages into {} canonical messages, {} tools",
        req.messages.len(),
        messages.len(),
        tools.len()
    );

    Ok(CanonicalRequest {
        model: req.model,
        messages,
        tools: if tools.is_empty() { None } else { Some(tools) },
        tool_choice,
        stream: req.stream,
        extra,
    })
}

/// One Anthropic message -> zero or more canonical messages.
///
/// `tool_result` blocks become separate `tool` messages placed before the
/// rest of the turn. The remaining message is emitted only when it has
/// non-empty text, an image or at least one tool call.
fn decode_message(msg: &ClaudeMessage, out: &mut Vec<CanonicalMessage>) {
    let blocks = match &msg.content {
        ClaudeMessageContent::String(text) => {
            if !text.is_empty() {
                out.push(CanonicalMessage::text_message(msg.role.clone(), text.clone()));
            }
            return;
        }
        ClaudeMessageContent::Array(blocks) => blocks,
    };

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut images = Vec::new();
    let mut calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::Thinking { thinking, .. } => reasoning.push_str(thinking),
            ContentBlock::Image { source } => {
                if let Some(url) = image_source_to_url(source) {
                    images.push(ContentPart::ImageUrl { image_url: ImageUrl { url, detail: None } });
                }
            }
            ContentBlock::ToolUse { id, name, input } => {
                let args = if input.is_null() { "{}".to_string() } else { input.to_string() };
                calls.push(ToolCall::new(id.clone(), name.clone(), args));
            }
            ContentBlock::ToolResult { content, is_error, .. } => {
                let id = block.result_call_id().unwrap_or_default();
                out.push(CanonicalMessage::tool_result(id, value_to_text(content)).with_error_flag(*is_error));
            }
            ContentBlock::RedactedThinking { .. } | ContentBlock::Unknown => {}
        }
    }

    if text.is_empty() && images.is_empty() && calls.is_empty() {
        return;
    }

    let content = if images.is_empty() {
        (!text.is_empty()).then(|| MessageContent::Text(text))
    } else {
        let mut parts = Vec::with_capacity(images.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::Text { text });
        }
        parts.extend(images);
        Some(MessageContent::Parts(parts))
    };

    out.push(CanonicalMessage {
        role: msg.role.clone(),
        content,
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        tool_calls: if calls.is_empty() { None } else { Some(calls) },
        ..Default::default()
    });
}

fn decode_tool(tool: &ClaudeTool) -> Option<ToolDefinition> {
    let name = tool.name.as_deref().filter(|n| !n.is_empty())?;
    let mut parameters = tool
        .input_schema
        .clone()
        .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
    prune_schema_keyword(&mut parameters);
    Some(ToolDefinition::function(name, tool.description.clone(), parameters))
}

fn decode_tool_choice(choice: &ClaudeToolChoice) -> Value {
    match choice {
        ClaudeToolChoice::Auto => json!("auto"),
        ClaudeToolChoice::Any => json!("required"),
        ClaudeToolChoice::None => json!("none"),
        ClaudeToolChoice::Tool { name } => json!({"type": "function", "function": {"name": name}}),
    }
}

fn image_source_to_url(source: &ImageSource) -> Option<String> {
    match source.source_type.as_str() {
        "base64" => {
            let data = source.data.as_deref()?;
            let media_type = source.media_type.as_deref().unwrap_or("image/png");
            Some(format!("data:{};base64,{}", media_type, data))
        }
        _ => source.url.clone(),
    }
}

/// Canonical -> Anthropic Messages request.
///
/// All system messages join into the top-level `system`. Tool results and
/// user text that follow each other merge into one user turn, since the
/// Messages API wants roles to alternate.
pub fn encode_request(req: &CanonicalRequest) -> HubResult<Value> {
    let system_text = req
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(CanonicalMessage::text)
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages: Vec<ClaudeMessage> = Vec::with_capacity(req.messages.len());
    for msg in req.messages.iter().filter(|m| m.role != "system") {
        let (role, blocks) = encode_message(msg);
        if blocks.is_empty() {
            continue;
        }
        if let Some(ClaudeMessage { role: last_role, content: ClaudeMessageContent::Array(last) }) = messages.last_mut() {
            if last_role.as_str() == role {
                last.extend(blocks);
                continue;
            }
        }
        messages.push(ClaudeMessage { role: role.to_string(), content: ClaudeMessageContent::Array(blocks) });
    }

    let tools: Vec<ClaudeTool> = req
        .tool_definitions()
        .iter()
        .map(|def| ClaudeTool {
            type_: None,
            name: Some(def.function.name.clone()),
            description: def.function.description.clone(),
            input_schema: Some(def.function.parameters.clone()),
        })
        .collect();

    let out = ClaudeRequest {
        model: req.model.clone(),
        messages,
        system: (!system_text.is_empty()).then_some(SystemPrompt::String(system_text)),
        tool_choice: if tools.is_empty() { None } else { req.tool_choice.as_ref().and_then(encode_tool_choice) },
        tools: if tools.is_empty() { None } else { Some(tools) },
        stream: req.stream,
        max_tokens: Some(extra_u32(&req.extra, "max_tokens").unwrap_or(DEFAULT_MAX_TOKENS)),
        temperature: extra_f32(&req.extra, "temperature"),
        top_p: extra_f32(&req.extra, "top_p"),
        top_k: extra_u32(&req.extra, "top_k"),
        stop_sequences: req.extra.get("stop").and_then(stop_list),
        thinking: None,
        metadata: None,
    };

    serde_json::to_value(out).map_err(|e| ConversionError::malformed_request(Protocol::Anthropic, e.to_string()))
}

fn encode_message(msg: &CanonicalMessage) -> (&'static str, Vec<ContentBlock>) {
    if msg.role == "tool" {
        let id = msg.tool_call_id.clone().unwrap_or_default();
        let block = ContentBlock::tool_result(id, Value::String(msg.text())).with_error_flag(msg.is_error);
        return ("user", vec![block]);
    }

    let role = if msg.role == "assistant" { "assistant" } else { "user" };
    let mut blocks = Vec::new();
    match &msg.content {
        Some(MessageContent::Text(text)) if !text.trim().is_empty() => {
            blocks.push(ContentBlock::Text { text: text.clone() });
        }
        Some(MessageContent::Parts(parts)) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } if !text.trim().is_empty() => {
                        blocks.push(ContentBlock::Text { text: text.clone() });
                    }
                    ContentPart::ImageUrl { image_url } => blocks.push(ContentBlock::Image {
                        source: url_to_image_source(&image_url.url),
                    }),
                    _ => {}
                }
            }
        }
        _ => {}
    }

    for call in msg.calls() {
        let input = parse_or_repair(&Value::String(call.function.arguments.clone()))
            .map(Value::Object)
            .unwrap_or_else(|_| json!({}));
        blocks.push(ContentBlock::ToolUse { id: call.id.clone(), name: call.function.name.clone(), input });
    }
    (role, blocks)
}

fn url_to_image_source(url: &str) -> ImageSource {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((media_type, data)) = rest.split_once(";base64,") {
            return ImageSource {
                source_type: "base64".to_string(),
                media_type: Some(media_type.to_string()),
                data: Some(data.to_string()),
                url: None,
            };
        }
    }
    ImageSource { source_type: "url".to_string(), media_type: None, data: None, url: Some(url.to_string()) }
}

fn encode_tool_choice(choice: &Value) -> Option<ClaudeToolChoice> {
    match choice {
        Value::String(s) => match s.as_str() {
            "auto" => Some(ClaudeToolChoice::Auto),
            "required" | "any" => Some(ClaudeToolChoice::Any),
            "none" => Some(ClaudeToolChoice::None),
            _ => None,
        },
        Value::Object(_) => choice
            .pointer("/function/name")
            .or_else(|| choice.get("name"))
            .and_then(Value::as_str)
            .map(|name| ClaudeToolChoice::Tool { name: name.to_string() }),
        _ => None,
    }
}

fn extra_u32(extra: &Map<String, Value>, key: &str) -> Option<u32> {
    extra.get(key).and_then(Value::as_u64).and_then(|v| u32::try_from(v).ok())
}

#[allow(clippy::cast_possible_truncation, reason = "sampling parameters fit in f32")]
fn extra_f32(extra: &Map<String, Value>, key: &str) -> Option<f32> {
    extra.get(key).and_then(Value::as_f64).map(|v| v as f32)
}

/// OpenAI `stop` is a string or a list of strings.
pub fn stop_list(stop: &Value) -> Option<Vec<String>> {
    let list: Vec<String> = match stop {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => return None,
    };
    (!list.is_empty()).then_some(list)
}
