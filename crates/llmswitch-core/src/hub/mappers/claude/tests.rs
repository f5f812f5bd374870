use super::*;
use llmswitch_types::models::{CanonicalMessage, CanonicalResponse, ToolCall, Usage};
use llmswitch_types::ErrorKind;
use serde_json::{json, Value};

fn sample_request() -> Value {
    json!({
        "model": "claude-sonnet-4-5",
        "max_tokens": 1024,
        "system": [{"type": "text", "text": "You are terse."}, {"type": "text", "text": "Use tools."}],
        "tools": [{
            "name": "read_file",
            "description": "Read a file",
            "input_schema": {"$schema": "http://json-schema.org/draft-07/schema#", "type": "object", "properties": {"path": {"type": "string"}}}
        }],
        "messages": [
            {"role": "user", "content": "Open README please"},
            {"role": "assistant", "content": [
                {"type": "thinking", "thinking": "need the file", "signature": "sig"},
                {"type": "text", "text": "Reading."},
                {"type": "tool_use", "id": "toolu_1", "name": "read_file", "input": {"path": "README.md"}}
            ]},
            {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": [{"type": "text", "text": "# Title"}]},
                {"type": "text", "text": "Summarize it"}
            ]}
        ]
    })
}

#[test]
fn test_system_lifted_to_first_message() {
    let req = decode_request(&sample_request()).unwrap();
    assert_eq!(req.messages[0].role, "system");
    assert_eq!(req.messages[0].text(), "You are terse.\n\nUse tools.");
    assert_eq!(req.system_text().as_deref(), Some("You are terse.\n\nUse tools."));
}

#[test]
fn test_request_decode_shape() {
    let req = decode_request(&sample_request()).unwrap();
    let roles: Vec<&str> = req.messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "tool", "user"]);

    let assistant = &req.messages[2];
    assert_eq!(assistant.text(), "Reading.");
    assert_eq!(assistant.reasoning_content.as_deref(), Some("need the file"));
    let args: Value = serde_json::from_str(&assistant.calls()[0].function.arguments).unwrap();
    assert_eq!(args, json!({"path": "README.md"}));

    assert_eq!(req.messages[3].tool_call_id.as_deref(), Some("toolu_1"));
    assert_eq!(req.messages[3].text(), "# Title");

    let tools = req.tools.as_ref().unwrap();
    assert_eq!(tools[0].name(), "read_file");
    assert!(tools[0].function.parameters.get("$schema").is_none());
    assert_eq!(req.extra["max_tokens"], 1024);
}

#[test]
fn test_empty_messages_are_skipped() {
    let req = decode_request(&json!({
        "model": "m",
        "messages": [
            {"role": "user", "content": ""},
            {"role": "assistant", "content": [{"type": "redacted_thinking", "data": "x"}]},
            {"role": "user", "content": "still here"}
        ]
    }))
    .unwrap();
    assert_eq!(req.messages.len(), 1);
    assert_eq!(req.messages[0].text(), "still here");
}

#[test]
fn test_tool_choice_mapping() {
    let mut payload = sample_request();
    payload["tool_choice"] = json!({"type": "any"});
    assert_eq!(decode_request(&payload).unwrap().tool_choice, Some(json!("required")));

    payload["tool_choice"] = json!({"type": "tool", "name": "read_file"});
    assert_eq!(
        decode_request(&payload).unwrap().tool_choice,
        Some(json!({"type": "function", "function": {"name": "read_file"}}))
    );
}

#[test]
fn test_request_round_trip() {
    let original = sample_request();
    let canonical = decode_request(&original).unwrap();
    let encoded = encode_request(&canonical).unwrap();

    assert_eq!(encoded["system"], "You are terse.\n\nUse tools.");
    assert_eq!(encoded["max_tokens"], 1024);
    let messages = encoded["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], json!({"role": "user", "content": [{"type": "text", "text": "Open README please"}]}));
    assert_eq!(messages[1]["content"][0], json!({"type": "text", "text": "Reading."}));
    assert_eq!(
        messages[1]["content"][1],
        json!({"type": "tool_use", "id": "toolu_1", "name": "read_file", "input": {"path": "README.md"}})
    );
    // tool result and trailing text merge back into one user turn
    assert_eq!(messages[2]["content"][0]["type"], "tool_result");
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
    assert_eq!(messages[2]["content"][1]["text"], "Summarize it");
    assert_eq!(encoded["tools"][0]["name"], "read_file");

    // thinking is not replayed to Anthropic without its signature
    let again = decode_request(&encoded).unwrap();
    let expected: Vec<CanonicalMessage> = canonical.messages[1..]
        .iter()
        .cloned()
        .map(|mut m| {
            m.reasoning_content = None;
            m
        })
        .collect();
    assert_eq!(&again.messages[1..], expected.as_slice());
}

#[test]
fn test_failed_tool_result_round_trip() {
    let original = json!({
        "model": "claude-sonnet-4-5",
        "max_tokens": 64,
        "messages": [
            {"role": "assistant", "content": [{"type": "tool_use", "id": "toolu_9", "name": "shell", "input": {"command": "false"}}]},
            {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "toolu_9", "content": "exit 1", "is_error": true}]}
        ]
    });
    let canonical = decode_request(&original).unwrap();
    assert_eq!(canonical.messages[1].role, "tool");
    assert_eq!(canonical.messages[1].is_error, Some(true));

    let encoded = encode_request(&canonical).unwrap();
    let result = &encoded["messages"][1]["content"][0];
    assert_eq!(result["type"], "tool_result");
    assert_eq!(result["is_error"], true);
    assert_eq!(result["content"], "exit 1");
}

#[test]
fn test_default_max_tokens_on_encode() {
    let req = llmswitch_types::CanonicalRequest::new("m", vec![CanonicalMessage::text_message("user", "hi")]);
    let encoded = encode_request(&req).unwrap();
    assert_eq!(encoded["max_tokens"], DEFAULT_MAX_TOKENS);
    assert!(encoded.get("system").is_none());
}

fn response(message: CanonicalMessage, finish: Option<&str>) -> CanonicalResponse {
    let mut resp = CanonicalResponse::new("chatcmpl-1", "gpt-4o", 0, message);
    resp.choices[0].finish_reason = finish.map(str::to_string);
    resp
}

#[test]
fn test_stop_reason_mapping() {
    let cases = [
        (Some("tool_calls"), "tool_use"),
        (Some("stop"), "end_turn"),
        (Some("length"), "max_tokens"),
        (Some("content_filter"), "refusal"),
        (Some("something_new"), "end_turn"),
        (None, "end_turn"),
    ];
    for (finish, expected) in cases {
        let out = encode_response(&response(CanonicalMessage::text_message("assistant", "x"), finish)).unwrap();
        assert_eq!(out["stop_reason"], expected, "finish_reason {:?}", finish);
    }

    let mut msg = CanonicalMessage::text_message("assistant", "");
    msg.tool_calls = Some(vec![ToolCall::new("c1", "echo", "{}")]);
    let out = encode_response(&response(msg, None)).unwrap();
    assert_eq!(out["stop_reason"], "tool_use");
}

#[test]
fn test_response_blocks_and_usage() {
    let mut msg = CanonicalMessage::text_message("assistant", "   ");
    msg.tool_calls = Some(vec![ToolCall::new("c1", "echo", "not json"), ToolCall::new("c2", "echo", r#"{"text":"hi"}"#)]);
    let mut resp = response(msg, Some("tool_calls"));
    resp.usage = Some(Usage::new(12, 3));

    let out = encode_response(&resp).unwrap();
    let content = out["content"].as_array().unwrap();
    assert_eq!(content.len(), 2);
    assert_eq!(content[0]["input"], json!({}));
    assert_eq!(content[1]["input"], json!({"text": "hi"}));
    assert_eq!(out["usage"], json!({"input_tokens": 12, "output_tokens": 3}));

    resp.usage = Some(Usage::default());
    assert!(encode_response(&resp).unwrap().get("usage").is_none());
}

#[test]
fn test_empty_choices_is_malformed() {
    let mut resp = response(CanonicalMessage::text_message("assistant", "x"), None);
    resp.choices.clear();
    assert_eq!(encode_response(&resp).unwrap_err().kind(), ErrorKind::MalformedResponse);
}

#[test]
fn test_response_round_trip() {
    let mut msg = CanonicalMessage::text_message("assistant", "Done.");
    msg.tool_calls = Some(vec![ToolCall::new("toolu_9", "echo", r#"{"text":"hi"}"#)]);
    let mut resp = response(msg, Some("tool_calls"));
    resp.usage = Some(Usage::new(5, 7));

    let claude = encode_response(&resp).unwrap();
    let back = decode_response(&claude).unwrap();
    let choice = &back.choices[0];
    assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
    assert_eq!(choice.message.text(), "Done.");
    assert_eq!(choice.message.calls(), resp.choices[0].message.calls());
    assert_eq!(back.usage, Some(Usage::new(5, 7)));
    assert_eq!(back.id, "chatcmpl-1");
}

#[test]
fn test_error_reply_is_malformed() {
    let err = decode_response(&json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert!(err.to_string().contains("Overloaded"));
}

#[test]
fn test_stop_list() {
    assert_eq!(stop_list(&json!("END")), Some(vec!["END".to_string()]));
    assert_eq!(stop_list(&json!(["a", "b"])), Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(stop_list(&json!([])), None);
}
