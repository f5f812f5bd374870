use super::*;
use llmswitch_types::models::{CanonicalMessage, CanonicalRequest, CanonicalResponse, ToolCall, ToolDefinition, Usage};
use llmswitch_types::ErrorKind;
use serde_json::json;

fn tool_conversation() -> CanonicalRequest {
    let mut assistant = CanonicalMessage::text_message("assistant", "");
    assistant.content = None;
    assistant.tool_calls = Some(vec![ToolCall::new("call_1", "shell", r#"{"command":["ls"]}"#)]);

    let mut req = CanonicalRequest::new(
        "gemini-2.5-pro",
        vec![
            CanonicalMessage::text_message("system", "Be brief."),
            CanonicalMessage::text_message("user", "List files"),
            assistant,
            CanonicalMessage::tool_result("call_1", "a.txt"),
            CanonicalMessage::text_message("user", "thanks"),
        ],
    );
    req.tools = Some(vec![ToolDefinition::function(
        "shell",
        Some("Run a command".to_string()),
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {"command": {"type": "array", "items": {"type": "string"}}}
        }),
    )]);
    req.tool_choice = Some(json!("auto"));
    req.extra.insert("max_tokens".to_string(), json!(256));
    req.extra.insert("stop".to_string(), json!("END"));
    req
}

#[test]
fn test_encode_request_shape() {
    let out = encode_request(&tool_conversation()).unwrap();

    assert_eq!(out["systemInstruction"]["parts"][0]["text"], "Be brief.");
    let contents = out["contents"].as_array().unwrap();
    // tool result and trailing user text merge into one user content
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(
        contents[1]["parts"][0]["functionCall"],
        json!({"name": "shell", "id": "call_1", "args": {"command": ["ls"]}})
    );
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(
        contents[2]["parts"][0]["functionResponse"],
        json!({"name": "shell", "response": {"result": "a.txt"}, "id": "call_1"})
    );
    assert_eq!(contents[2]["parts"][1]["text"], "thanks");

    let decl = &out["tools"][0]["functionDeclarations"][0];
    assert_eq!(decl["name"], "shell");
    assert_eq!(decl["parameters"]["type"], "OBJECT");
    assert!(decl["parameters"].get("additionalProperties").is_none());

    assert_eq!(out["toolConfig"], json!({"functionCallingConfig": {"mode": "AUTO"}}));
    assert_eq!(out["generationConfig"], json!({"maxOutputTokens": 256, "stopSequences": ["END"]}));
}

#[test]
fn test_named_tool_choice() {
    let mut req = tool_conversation();
    req.tool_choice = Some(json!({"type": "function", "function": {"name": "shell"}}));
    let out = encode_request(&req).unwrap();
    assert_eq!(
        out["toolConfig"]["functionCallingConfig"],
        json!({"mode": "ANY", "allowedFunctionNames": ["shell"]})
    );
}

#[test]
fn test_request_round_trip_through_gemini() {
    let original = tool_conversation();
    let gemini = encode_request(&original).unwrap();
    let back = decode_request(&gemini, "gemini-2.5-pro").unwrap();

    assert_eq!(back.model, "gemini-2.5-pro");
    assert_eq!(back.system_text().as_deref(), Some("Be brief."));
    let roles: Vec<&str> = back.messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "tool", "user"]);
    assert_eq!(back.messages[2].calls()[0].id, "call_1");
    assert_eq!(back.messages[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(back.messages[3].text(), "a.txt");
    assert_eq!(back.tool_choice, Some(json!("auto")));
    assert_eq!(back.extra["max_tokens"], 256);
    assert_eq!(back.tools.as_ref().unwrap()[0].function.parameters["type"], "object");
}

#[test]
fn test_function_call_signature_survives_round_trip() {
    let signature = "g".repeat(64);
    let payload = json!({
        "contents": [
            {"role": "user", "parts": [{"text": "weather?"}]},
            {"role": "model", "parts": [
                {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}, "thoughtSignature": signature}
            ]}
        ]
    });
    let req = decode_request(&payload, "gemini-2.5-pro").unwrap();
    assert_eq!(req.messages[1].calls()[0].thought_signature.as_deref(), Some(signature.as_str()));

    let encoded = encode_request(&req).unwrap();
    assert_eq!(encoded["contents"][1]["parts"][0]["thoughtSignature"], signature);
}

#[test]
fn test_function_response_without_id_pairs_by_name() {
    let payload = json!({
        "contents": [
            {"role": "user", "parts": [{"text": "weather?"}]},
            {"role": "model", "parts": [{"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}]},
            {"role": "user", "parts": [{"functionResponse": {"name": "get_weather", "response": {"result": {"temp": 21}}}}]}
        ]
    });
    let req = decode_request(&payload, "gemini-2.5-flash").unwrap();
    let call_id = req.messages[1].calls()[0].id.clone();
    assert!(call_id.starts_with("call_"));
    assert_eq!(req.messages[2].tool_call_id.as_deref(), Some(call_id.as_str()));
    assert_eq!(req.messages[2].text(), r#"{"temp":21}"#);
}

#[test]
fn test_decode_response() {
    let payload = json!({
        "response": {
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "planning", "thought": true},
                    {"text": "Calling tool."},
                    {"functionCall": {"name": "shell", "args": {"command": "ls"}}, "thoughtSignature": "s".repeat(60)}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14},
            "modelVersion": "gemini-2.5-pro",
            "responseId": "resp-1"
        }
    });
    let resp = decode_response(&payload, "hint").unwrap();
    let choice = &resp.choices[0];
    assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
    assert_eq!(choice.message.text(), "Calling tool.");
    assert_eq!(choice.message.reasoning_content.as_deref(), Some("planning"));
    assert!(choice.message.calls()[0].id.starts_with("call_"));
    assert_eq!(resp.usage, Some(Usage::new(10, 4)));
    assert_eq!(resp.id, "resp-1");
    assert_eq!(resp.model, "gemini-2.5-pro");
}

#[test]
fn test_finish_reason_mapping() {
    assert_eq!(finish_from_gemini("STOP"), "stop");
    assert_eq!(finish_from_gemini("MAX_TOKENS"), "length");
    for reason in ["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT"] {
        assert_eq!(finish_from_gemini(reason), "content_filter");
    }
    assert_eq!(gemini_from_finish("length"), "MAX_TOKENS");
    assert_eq!(gemini_from_finish("tool_calls"), "STOP");
}

#[test]
fn test_blocked_and_error_replies_are_malformed() {
    let err = decode_response(&json!({"promptFeedback": {"blockReason": "SAFETY"}}), "m").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert!(err.to_string().contains("SAFETY"));

    let err = decode_response(&json!({"error": {"code": 429, "message": "Resource exhausted"}}), "m").unwrap_err();
    assert!(err.to_string().contains("Resource exhausted"));
}

#[test]
fn test_encode_response_for_gemini_clients() {
    let mut msg = CanonicalMessage::text_message("assistant", "");
    msg.tool_calls = Some(vec![ToolCall::new("call_1", "shell", r#"{"command":"ls"}"#)]);
    let mut resp = CanonicalResponse::new("chatcmpl-1", "gemini-2.5-pro", 0, msg);
    resp.choices[0].finish_reason = Some("tool_calls".to_string());

    let out = encode_response(&resp).unwrap();
    let candidate = &out["candidates"][0];
    assert_eq!(candidate["finishReason"], "STOP");
    assert_eq!(candidate["content"]["parts"].as_array().unwrap().len(), 1);
    assert_eq!(candidate["content"]["parts"][0]["functionCall"]["args"], json!({"command": "ls"}));
    assert!(out.get("usageMetadata").is_none());
}

#[test]
fn test_placeholder_signatures() {
    assert!(is_placeholder_signature("skip_thought_signature_validator"));
    assert!(is_placeholder_signature("context_engineering_is_the_way_to_go"));
    assert!(!is_placeholder_signature(&"x".repeat(60)));
}

#[test]
fn test_decode_request_from_envelope() {
    let inner = json!({"contents": [{"role": "user", "parts": [{"text": "hello"}]}]});
    let wrapped = wrap_request(inner, "p", "gemini-x", &llmswitch_types::GeminiEnvelopeConfig::default());
    let req = decode_request(&wrapped, "unused").unwrap();
    assert_eq!(req.model, "gemini-x");
    assert_eq!(req.messages[0].text(), "hello");
    assert_eq!(unwrap_request(&wrapped)["contents"][0]["role"], "user");
}
