// Gemini request transformation (canonical <-> generateContent)

use std::collections::HashMap;

use llmswitch_types::models::{
    CanonicalMessage, CanonicalRequest, ContentPart, ImageUrl, MessageContent, ToolCall, ToolDefinition,
};
use llmswitch_types::protocol::gemini::{
    FunctionDeclaration, GeminiContent, GeminiFunctionCall, GeminiFunctionResponse, GeminiPart, GeminiRequest,
    GeminiTool, InlineData,
};
use llmswitch_types::{ConversionError, Protocol};
use serde_json::{json, Map, Value};

use super::wrapper::unwrap_request;
use crate::hub::common::{clean_schema_for_gemini, generate_call_id, lowercase_schema_types};
use crate::hub::mappers::claude::stop_list;
use crate::hub::tools::parse_or_repair;
use crate::hub::HubResult;

/// Canonical -> bare Gemini `generateContent` body (no envelope).
pub fn encode_request(req: &CanonicalRequest) -> HubResult<Value> {
    let id_to_name: HashMap<&str, &str> = req
        .messages
        .iter()
        .flat_map(CanonicalMessage::calls)
        .map(|c| (c.id.as_str(), c.function.name.as_str()))
        .collect();

    let system_text = req
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(CanonicalMessage::text)
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut contents: Vec<GeminiContent> = Vec::with_capacity(req.messages.len());
    for msg in req.messages.iter().filter(|m| m.role != "system") {
        let content = encode_message(msg, &id_to_name);
        if content.parts.is_empty() {
            continue;
        }
        match contents.last_mut() {
            Some(last) if last.role == content.role => last.parts.extend(content.parts),
            _ => contents.push(content),
        }
    }

    let declarations: Vec<FunctionDeclaration> = req
        .tool_definitions()
        .iter()
        .map(|def| {
            let mut parameters = def.function.parameters.clone();
            clean_schema_for_gemini(&mut parameters);
            FunctionDeclaration {
                name: def.function.name.clone(),
                description: def.function.description.clone(),
                parameters: Some(parameters),
            }
        })
        .collect();

    let tool_config = if declarations.is_empty() { None } else { req.tool_choice.as_ref().and_then(encode_tool_choice) };
    let generation_config = encode_generation_config(&req.extra);

    let out = GeminiRequest {
        contents,
        system_instruction: (!system_text.is_empty())
            .then(|| GeminiContent { role: "user".to_string(), parts: vec![GeminiPart::text(system_text)] }),
        tools: (!declarations.is_empty())
            .then(|| vec![GeminiTool { function_declarations: Some(declarations), other: Map::new() }]),
        tool_config,
        generation_config,
        extra: Map::new(),
    };
    serde_json::to_value(out).map_err(|e| ConversionError::malformed_request(Protocol::Gemini, e.to_string()))
}

fn encode_message(msg: &CanonicalMessage, id_to_name: &HashMap<&str, &str>) -> GeminiContent {
    let mut parts = Vec::new();

    if msg.role == "tool" {
        let id = msg.tool_call_id.as_deref().unwrap_or_default();
        let name = id_to_name
            .get(id)
            .copied()
            .or(msg.name.as_deref())
            .unwrap_or("unknown_tool");
        parts.push(GeminiPart {
            function_response: Some(GeminiFunctionResponse {
                name: name.to_string(),
                response: json!({"result": msg.text()}),
                id: (!id.is_empty()).then(|| id.to_string()),
            }),
            ..Default::default()
        });
        return GeminiContent { role: "user".to_string(), parts };
    }

    let role = if msg.role == "assistant" { "model" } else { "user" };
    match &msg.content {
        Some(MessageContent::Text(text)) if !text.is_empty() => parts.push(GeminiPart::text(text.clone())),
        Some(MessageContent::Parts(content_parts)) => {
            for part in content_parts {
                match part {
                    ContentPart::Text { text } if !text.is_empty() => parts.push(GeminiPart::text(text.clone())),
                    ContentPart::ImageUrl { image_url } => match data_uri_to_inline(&image_url.url) {
                        Some(inline) => parts.push(GeminiPart { inline_data: Some(inline), ..Default::default() }),
                        None => tracing::debug!("[Gemini-Request] Skipping non-inline image {}", image_url.url),
                    },
                    _ => {}
                }
            }
        }
        _ => {}
    }

    for call in msg.calls() {
        let args = parse_or_repair(&Value::String(call.function.arguments.clone()))
            .map(Value::Object)
            .unwrap_or_else(|_| json!({}));
        parts.push(GeminiPart {
            function_call: Some(GeminiFunctionCall {
                name: call.function.name.clone(),
                id: (!call.id.is_empty()).then(|| call.id.clone()),
                args: Some(args),
            }),
            thought_signature: call.thought_signature.clone(),
            ..Default::default()
        });
    }

    GeminiContent { role: role.to_string(), parts }
}

fn data_uri_to_inline(url: &str) -> Option<InlineData> {
    let (mime_type, data) = url.strip_prefix("data:")?.split_once(";base64,")?;
    Some(InlineData { mime_type: mime_type.to_string(), data: data.to_string() })
}

fn encode_tool_choice(choice: &Value) -> Option<Value> {
    let config = match choice {
        Value::String(s) => match s.as_str() {
            "auto" => json!({"mode": "AUTO"}),
            "none" => json!({"mode": "NONE"}),
            "required" | "any" => json!({"mode": "ANY"}),
            _ => return None,
        },
        Value::Object(_) => {
            let name = choice.pointer("/function/name").and_then(Value::as_str)?;
            json!({"mode": "ANY", "allowedFunctionNames": [name]})
        }
        _ => return None,
    };
    Some(json!({"functionCallingConfig": config}))
}

fn encode_generation_config(extra: &Map<String, Value>) -> Option<Value> {
    let mut config = Map::new();
    for (from, to) in [("max_tokens", "maxOutputTokens"), ("temperature", "temperature"), ("top_p", "topP"), ("top_k", "topK")]
    {
        if let Some(v) = extra.get(from).filter(|v| v.is_number()) {
            config.insert(to.to_string(), v.clone());
        }
    }
    if let Some(stop) = extra.get("stop").and_then(stop_list) {
        config.insert("stopSequences".to_string(), json!(stop));
    }
    (!config.is_empty()).then_some(Value::Object(config))
}

/// Gemini request (from a Gemini-speaking client) -> canonical.
///
/// Accepts the bare body or the `request`-scoped envelope. `model_hint` is
/// used when the body does not name the model (Gemini carries it in the URL).
pub fn decode_request(payload: &Value, model_hint: &str) -> HubResult<CanonicalRequest> {
    let inner = unwrap_request(payload);
    let req: GeminiRequest = serde_json::from_value(inner.clone())
        .map_err(|e| ConversionError::malformed_request(Protocol::Gemini, e.to_string()))?;

    let mut messages = Vec::with_capacity(req.contents.len() + 1);
    if let Some(system) = &req.system_instruction {
        let text = parts_text(&system.parts);
        if !text.trim().is_empty() {
            messages.push(CanonicalMessage::text_message("system", text));
        }
    }

    // functionResponse parts without an id answer the latest call of the same name
    let mut pending: HashMap<String, String> = HashMap::new();
    for content in &req.contents {
        if content.role == "model" {
            messages.push(decode_model_content(content, &mut pending));
        } else {
            decode_user_content(content, &mut pending, &mut messages);
        }
    }

    let tools: Vec<ToolDefinition> = req
        .tools
        .iter()
        .flatten()
        .filter_map(|t| t.function_declarations.as_ref())
        .flatten()
        .map(|decl| {
            let mut parameters = decl.parameters.clone().unwrap_or_else(|| json!({"type": "object", "properties": {}}));
            lowercase_schema_types(&mut parameters);
            ToolDefinition::function(decl.name.clone(), decl.description.clone(), parameters)
        })
        .collect();

    let model = payload
        .get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(model_hint)
        .to_string();

    Ok(CanonicalRequest {
        model,
        messages,
        tool_choice: req.tool_config.as_ref().and_then(decode_tool_config),
        tools: if tools.is_empty() { None } else { Some(tools) },
        // the endpoint decides; see `SessionMetadata::stream`
        stream: false,
        extra: decode_generation_config(req.generation_config.as_ref()),
    })
}

fn decode_model_content(content: &GeminiContent, pending: &mut HashMap<String, String>) -> CanonicalMessage {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut calls = Vec::new();
    for part in &content.parts {
        if let Some(fc) = &part.function_call {
            let id = fc.id.clone().filter(|id| !id.is_empty()).unwrap_or_else(generate_call_id);
            pending.insert(fc.name.clone(), id.clone());
            let args = fc.args.as_ref().map_or_else(|| "{}".to_string(), Value::to_string);
            let call = ToolCall::new(id, fc.name.clone(), args);
            calls.push(call.with_thought_signature(part.thought_signature.clone()));
        } else if let Some(t) = &part.text {
            if part.is_thought() {
                reasoning.push_str(t);
            } else {
                text.push_str(t);
            }
        }
    }
    CanonicalMessage {
        role: "assistant".to_string(),
        content: if text.is_empty() && !calls.is_empty() { None } else { Some(MessageContent::Text(text)) },
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        tool_calls: if calls.is_empty() { None } else { Some(calls) },
        ..Default::default()
    }
}

fn decode_user_content(
    content: &GeminiContent,
    pending: &mut HashMap<String, String>,
    out: &mut Vec<CanonicalMessage>,
) {
    let mut parts = Vec::new();
    for part in &content.parts {
        if let Some(fr) = &part.function_response {
            let id = fr
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .or_else(|| pending.remove(&fr.name))
                .unwrap_or_default();
            let result = match fr.response.get("result").or_else(|| fr.response.get("output")) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => fr.response.to_string(),
            };
            let mut msg = CanonicalMessage::tool_result(id, result);
            msg.name = Some(fr.name.clone());
            out.push(msg);
        } else if let Some(inline) = &part.inline_data {
            let url = format!("data:{};base64,{}", inline.mime_type, inline.data);
            parts.push(ContentPart::ImageUrl { image_url: ImageUrl { url, detail: None } });
        } else if let Some(t) = part.text.as_ref().filter(|t| !t.is_empty()) {
            parts.push(ContentPart::Text { text: t.clone() });
        }
    }

    if parts.is_empty() {
        return;
    }
    let content = if parts.iter().all(|p| matches!(p, ContentPart::Text { .. })) {
        let text: String = parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        MessageContent::Text(text)
    } else {
        MessageContent::Parts(parts)
    };
    out.push(CanonicalMessage { role: "user".to_string(), content: Some(content), ..Default::default() });
}

fn parts_text(parts: &[GeminiPart]) -> String {
    parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn decode_tool_config(config: &Value) -> Option<Value> {
    let calling = config.get("functionCallingConfig")?;
    let mode = calling.get("mode").and_then(Value::as_str)?.to_ascii_uppercase();
    let allowed: Vec<&str> = calling
        .get("allowedFunctionNames")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    match mode.as_str() {
        "AUTO" => Some(json!("auto")),
        "NONE" => Some(json!("none")),
        "ANY" if allowed.len() == 1 => Some(json!({"type": "function", "function": {"name": allowed[0]}})),
        "ANY" => Some(json!("required")),
        _ => None,
    }
}

fn decode_generation_config(config: Option<&Value>) -> Map<String, Value> {
    let mut extra = Map::new();
    let Some(config) = config else {
        return extra;
    };
    for (from, to) in [("maxOutputTokens", "max_tokens"), ("temperature", "temperature"), ("topP", "top_p"), ("topK", "top_k")]
    {
        if let Some(v) = config.get(from).filter(|v| v.is_number()) {
            extra.insert(to.to_string(), v.clone());
        }
    }
    if let Some(stop) = config.get("stopSequences").filter(|v| v.is_array()) {
        extra.insert("stop".to_string(), stop.clone());
    }
    extra
}
