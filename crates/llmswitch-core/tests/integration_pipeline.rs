#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test: panics are the assertion mechanism")]

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use llmswitch_core::hub::SignatureCache;
use llmswitch_core::{HubConfig, HubPipeline, Protocol, SessionMetadata};
use serde_json::{json, Value};

const SIGNATURE: &str = "EqQBCkgIARABGAIiQNJp0t7x5mG1cJ3kq9v2hX8Zl4s6bYwA0fVdE1uTgPRc2oKjLnMi";
const CACHED_SIGNATURE: &str = "CiQBcsjafQ2b7yLx0mVvK3pWq8hN5tR1uE6oYgZkD4iA9sJfHcMnBxTlUe";

fn shell_tool() -> Value {
    json!({
        "name": "shell",
        "description": "Run a command",
        "input_schema": {
            "type": "object",
            "properties": {"command": {"type": "string"}},
            "required": ["command"]
        }
    })
}

fn gemini_call_reply(signature: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"functionCall": {"name": "shell", "args": {"command": "ls"}}, "thoughtSignature": signature}]
            },
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 5}
    })
}

fn follow_up(first_message: &str, call_id: &str) -> Value {
    json!({
        "model": "gemini-2.5-pro",
        "max_tokens": 256,
        "tools": [shell_tool()],
        "messages": [
            {"role": "user", "content": first_message},
            {"role": "assistant", "content": [{"type": "tool_use", "id": call_id, "name": "shell", "input": {"command": "ls"}}]},
            {"role": "user", "content": [{"type": "tool_result", "tool_use_id": call_id, "content": "a.txt"}]}
        ]
    })
}

fn function_call_signatures(payload: &Value) -> Vec<Option<String>> {
    payload["contents"]
        .as_array()
        .expect("contents")
        .iter()
        .flat_map(|c| c["parts"].as_array().cloned().unwrap_or_default())
        .filter(|p| p.get("functionCall").is_some())
        .map(|p| p.get("thoughtSignature").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[test]
fn test_anthropic_round_trip_through_openai() {
    let pipeline = HubPipeline::with_defaults();
    let request = json!({
        "model": "gpt-4o",
        "max_tokens": 512,
        "system": [{"type": "text", "text": "Be brief."}],
        "stop_sequences": ["END"],
        "tools": [shell_tool()],
        "messages": [{"role": "user", "content": "What is in this directory?"}]
    });

    let prepared = pipeline
        .prepare_request(Protocol::Anthropic, Protocol::OpenAI, request, SessionMetadata::default())
        .expect("prepare");
    let wire = &prepared.payload;
    assert_eq!(wire["messages"][0]["role"], "system");
    assert_eq!(wire["messages"][0]["content"], "Be brief.");
    assert_eq!(wire["messages"][1]["content"], "What is in this directory?");
    assert_eq!(wire["stop"], json!(["END"]));
    assert_eq!(wire["max_tokens"], 512);
    assert_eq!(wire["tools"][0]["function"]["name"], "shell");
    assert_eq!(wire["tool_choice"], "auto");
    assert!(prepared.state.session.is_none());

    let reply = json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "Listing.",
                "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "shell", "arguments": "{\"command\": \"ls\"}"}}]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 8, "total_tokens": 28}
    });
    let out = pipeline.convert_response(&prepared.state, reply).expect("convert");
    assert_eq!(out["type"], "message");
    assert_eq!(out["stop_reason"], "tool_use");
    assert_eq!(out["content"][0], json!({"type": "text", "text": "Listing."}));
    assert_eq!(out["content"][1]["type"], "tool_use");
    assert_eq!(out["content"][1]["id"], "call_1");
    assert_eq!(out["content"][1]["input"], json!({"command": "ls"}));
    assert_eq!(out["usage"]["input_tokens"], 20);
}

#[test]
fn test_stop_reason_mapping() {
    let pipeline = HubPipeline::with_defaults();
    let prepared = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::OpenAI,
            json!({"model": "gpt-4o", "max_tokens": 8, "messages": [{"role": "user", "content": "hello there"}]}),
            SessionMetadata::default(),
        )
        .expect("prepare");

    for (finish, stop) in [("stop", "end_turn"), ("length", "max_tokens"), ("content_filter", "refusal")] {
        let reply = json!({
            "id": "x",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}, "finish_reason": finish}]
        });
        let out = pipeline.convert_response(&prepared.state, reply).expect("convert");
        assert_eq!(out["stop_reason"], stop, "finish_reason {}", finish);
    }
}

#[test]
fn test_text_markup_is_harvested_into_tool_calls() {
    let pipeline = HubPipeline::with_defaults();
    let prepared = pipeline
        .prepare_request(
            Protocol::OpenAI,
            Protocol::OpenAI,
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "say hi with echo"}]}),
            SessionMetadata::default(),
        )
        .expect("prepare");

    let reply = json!({
        "id": "chatcmpl-2",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "<tool_call>{\"name\":\"echo\",\"arguments\":{\"text\":\"hi\"}}</tool_call>"},
            "finish_reason": "stop"
        }]
    });
    let out = pipeline.convert_response(&prepared.state, reply).expect("convert");
    let choice = &out["choices"][0];
    assert_eq!(choice["finish_reason"], "tool_calls");
    assert!(choice["message"]["content"].is_null());
    let calls = choice["message"]["tool_calls"].as_array().expect("tool_calls");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["function"]["name"], "echo");
    assert_eq!(calls[0]["function"]["arguments"], "{\"text\":\"hi\"}");
    assert!(!calls[0]["id"].as_str().unwrap_or_default().is_empty());

    // Running the same reply through again changes nothing further.
    let again = pipeline.convert_response(&prepared.state, out.clone()).expect("convert again");
    assert_eq!(again["choices"][0]["message"]["tool_calls"], out["choices"][0]["message"]["tool_calls"]);
}

#[test]
fn test_adjacent_duplicate_calls_are_collapsed() {
    let pipeline = HubPipeline::with_defaults();
    let prepared = pipeline
        .prepare_request(
            Protocol::OpenAI,
            Protocol::OpenAI,
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "run it twice"}]}),
            SessionMetadata::default(),
        )
        .expect("prepare");

    let call = json!({"id": "", "type": "function", "function": {"name": "shell", "arguments": "{\"command\":\"ls\"}"}});
    let reply = json!({
        "id": "x",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": null, "tool_calls": [call.clone(), call]},
            "finish_reason": "tool_calls"
        }]
    });
    let out = pipeline.convert_response(&prepared.state, reply).expect("convert");
    assert_eq!(out["choices"][0]["message"]["tool_calls"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_nameless_call_prefers_shell_over_view_image() {
    let pipeline = HubPipeline::with_defaults();
    let prepared = pipeline
        .prepare_request(
            Protocol::OpenAI,
            Protocol::OpenAI,
            json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "open it"}]}),
            SessionMetadata::default(),
        )
        .expect("prepare");

    let reply = json!({
        "id": "x",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{"id": "call_9", "type": "function", "function": {"name": "", "arguments": "{\"command\":\"cat\",\"path\":\"shot.png\"}"}}]
            },
            "finish_reason": "tool_calls"
        }]
    });
    let out = pipeline.convert_response(&prepared.state, reply).expect("convert");
    assert_eq!(out["choices"][0]["message"]["tool_calls"][0]["function"]["name"], "shell");
}

#[test]
fn test_gemini_envelope_wraps_request_and_unwraps_reply() {
    let mut config = HubConfig::default();
    config.gemini.envelope_project = Some("proj-1".to_string());
    let pipeline = HubPipeline::builder().config(config).build().expect("build");

    let prepared = pipeline
        .prepare_request(
            Protocol::OpenAI,
            Protocol::Gemini,
            json!({
                "model": "gemini-2.5-flash",
                "messages": [
                    {"role": "system", "content": "You are terse."},
                    {"role": "user", "content": "Summarize the news today"}
                ]
            }),
            SessionMetadata::default(),
        )
        .expect("prepare");

    let wire = &prepared.payload;
    assert_eq!(wire["project"], "proj-1");
    assert_eq!(wire["model"], "gemini-2.5-flash");
    assert_eq!(wire["request"]["systemInstruction"]["parts"][0]["text"], "You are terse.");
    assert_eq!(wire["request"]["contents"][0]["role"], "user");
    assert!(prepared.state.session.is_some());

    let reply = json!({
        "response": {
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Nothing new."}]}, "finishReason": "MAX_TOKENS"}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 3}
        }
    });
    let out = pipeline.convert_response(&prepared.state, reply).expect("convert");
    assert_eq!(out["choices"][0]["message"]["content"], "Nothing new.");
    assert_eq!(out["choices"][0]["finish_reason"], "length");
    assert_eq!(out["usage"]["total_tokens"], 7);
}

#[test]
fn test_signature_is_replayed_on_the_next_turn() {
    let pipeline = HubPipeline::with_defaults();
    let opener = "Please list the files in the repo";

    let first = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::Gemini,
            json!({
                "model": "gemini-2.5-pro",
                "max_tokens": 256,
                "tools": [shell_tool()],
                "messages": [{"role": "user", "content": opener}]
            }),
            SessionMetadata::default(),
        )
        .expect("prepare first turn");
    let session = first.state.session.clone().expect("gemini routes bind a session");
    assert_eq!(session.message_count, 1);

    let out = pipeline.convert_response(&first.state, gemini_call_reply(SIGNATURE)).expect("convert");
    assert_eq!(out["stop_reason"], "tool_use");
    let call_id = out["content"][0]["id"].as_str().expect("tool_use id").to_string();

    let cache = pipeline.signature_cache().expect("cache enabled");
    assert_eq!(cache.len(), 1);

    let second = pipeline
        .prepare_request(Protocol::Anthropic, Protocol::Gemini, follow_up(opener, &call_id), SessionMetadata::default())
        .expect("prepare second turn");
    assert_eq!(second.state.session.as_ref().map(|s| s.key.as_str()), Some(session.key.as_str()));
    assert_eq!(function_call_signatures(&second.payload), vec![Some(SIGNATURE.to_string())]);

    let response_part = second.payload["contents"]
        .as_array()
        .expect("contents")
        .iter()
        .flat_map(|c| c["parts"].as_array().cloned().unwrap_or_default())
        .find(|p| p.get("functionResponse").is_some())
        .expect("function response");
    assert_eq!(response_part["functionResponse"]["name"], "shell");
}

#[test]
fn test_rewound_history_drops_the_signature() {
    let cache = Arc::new(SignatureCache::with_limits(std::time::Duration::from_secs(60), 16, 10));
    let pipeline = HubPipeline::builder().signature_cache(cache.clone()).build().expect("build");
    let opener = "Please list the files in the repo";

    let long_history = {
        let mut body = follow_up(opener, "call_a");
        let messages = body["messages"].as_array_mut().expect("messages");
        messages.push(json!({"role": "assistant", "content": "done"}));
        messages.push(json!({"role": "user", "content": "and again"}));
        body
    };
    let turn = pipeline
        .prepare_request(Protocol::Anthropic, Protocol::Gemini, long_history, SessionMetadata::default())
        .expect("prepare");
    pipeline.convert_response(&turn.state, gemini_call_reply(SIGNATURE)).expect("convert");
    assert_eq!(cache.len(), 1);

    let rewound = pipeline
        .prepare_request(Protocol::Anthropic, Protocol::Gemini, follow_up(opener, "call_a"), SessionMetadata::default())
        .expect("prepare rewound");
    assert_eq!(function_call_signatures(&rewound.payload), vec![None]);
    assert!(cache.is_empty());
}

#[test]
fn test_account_binding_carries_signature_to_a_new_session() {
    let pipeline = HubPipeline::with_defaults();
    let meta = || SessionMetadata { account_id: Some("acct-1".to_string()), ..Default::default() };

    let first = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::Gemini,
            json!({
                "model": "gemini-2.5-pro",
                "max_tokens": 64,
                "tools": [shell_tool()],
                "messages": [{"role": "user", "content": "Please list the files in the repo"}]
            }),
            meta(),
        )
        .expect("prepare");
    pipeline.convert_response(&first.state, gemini_call_reply(SIGNATURE)).expect("convert");

    let other = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::Gemini,
            follow_up("A completely different conversation opener", "call_z"),
            meta(),
        )
        .expect("prepare other session");
    assert_eq!(other.state.session.map(|s| s.key), first.state.session.map(|s| s.key));
    assert_eq!(function_call_signatures(&other.payload), vec![Some(SIGNATURE.to_string())]);

    let stranger = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::Gemini,
            follow_up("A completely different conversation opener", "call_z"),
            SessionMetadata::default(),
        )
        .expect("prepare without account");
    assert_eq!(function_call_signatures(&stranger.payload), vec![None]);
}

#[tokio::test]
async fn test_gemini_stream_to_anthropic_client() {
    let pipeline = HubPipeline::with_defaults();
    let prepared = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::Gemini,
            json!({
                "model": "gemini-2.5-pro",
                "max_tokens": 64,
                "stream": true,
                "tools": [shell_tool()],
                "messages": [{"role": "user", "content": "Please list the files in the repo"}]
            }),
            SessionMetadata::default(),
        )
        .expect("prepare");
    assert!(prepared.state.stream);

    let text = json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Checking."}]}}]});
    let call = json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"functionCall": {"name": "shell", "args": {"command": "ls"}}, "thoughtSignature": SIGNATURE}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 4}
    });
    let wire = format!("data: {}\r\n\r\ndata: {}\r\n\r\n", text, call);
    let (head, tail) = wire.split_at(wire.len() / 2);
    let upstream = futures::stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from(head.to_string())),
        Ok(Bytes::from(tail.to_string())),
    ]);

    let frames: Vec<Bytes> = pipeline
        .convert_stream(&prepared.state, upstream)
        .expect("translator")
        .map(|frame| frame.expect("frame"))
        .collect()
        .await;
    let body: String = frames.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect();

    let order = ["message_start", "text_delta", "\"tool_use\"", "input_json_delta", "message_delta", "message_stop"];
    let positions: Vec<usize> = order.iter().map(|needle| body.find(needle).expect(needle)).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "events out of order: {}", body);
    assert!(body.contains("\"stop_reason\":\"tool_use\""));

    let cache = pipeline.signature_cache().expect("cache");
    let key = prepared.state.session.expect("session").key;
    assert_eq!(cache.get_and_maybe_invalidate(&key, 3).as_deref(), Some(SIGNATURE));
}

#[test]
fn test_disabled_cache_leaves_requests_untouched() {
    let mut config = HubConfig::default();
    config.signature_cache.enabled = false;
    let pipeline = HubPipeline::builder().config(config).build().expect("build");

    let turn = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::Gemini,
            follow_up("Please list the files in the repo", "call_q"),
            SessionMetadata::default(),
        )
        .expect("prepare");
    assert!(turn.state.session.is_none());
    assert_eq!(function_call_signatures(&turn.payload), vec![None]);
    pipeline.convert_response(&turn.state, gemini_call_reply(SIGNATURE)).expect("convert");
    assert!(pipeline.signature_cache().is_none());
}

fn gemini_call_turns(signatures: &[&str]) -> Value {
    let mut contents = vec![json!({"role": "user", "parts": [{"text": "Please list the files in the repo"}]})];
    for signature in signatures {
        contents.push(json!({"role": "model", "parts": [
            {"functionCall": {"name": "shell", "args": {"command": "ls"}}, "thoughtSignature": signature}
        ]}));
        contents.push(json!({"role": "user", "parts": [
            {"functionResponse": {"name": "shell", "response": {"result": "a.txt"}}}
        ]}));
    }
    json!({"contents": contents})
}

#[test]
fn test_gemini_passthrough_keeps_client_signatures() {
    let pipeline = HubPipeline::with_defaults();
    let first = pipeline
        .prepare_request(Protocol::Gemini, Protocol::Gemini, gemini_call_turns(&[SIGNATURE]), SessionMetadata::default())
        .expect("prepare");
    assert_eq!(function_call_signatures(&first.payload), vec![Some(SIGNATURE.to_string())]);

    let key = first.state.session.expect("session").key;
    let cache = pipeline.signature_cache().expect("cache");
    assert!(cache.put(&key, CACHED_SIGNATURE, 1, None));

    let second = pipeline
        .prepare_request(
            Protocol::Gemini,
            Protocol::Gemini,
            gemini_call_turns(&[SIGNATURE, "skip_thought_signature_validator"]),
            SessionMetadata::default(),
        )
        .expect("prepare");
    assert_eq!(
        function_call_signatures(&second.payload),
        vec![Some(SIGNATURE.to_string()), Some(CACHED_SIGNATURE.to_string())]
    );
}

#[test]
fn test_anthropic_passthrough_keeps_tool_error_flag() {
    let pipeline = HubPipeline::with_defaults();
    let prepared = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::Anthropic,
            json!({
                "model": "claude-sonnet-4",
                "max_tokens": 128,
                "tools": [shell_tool()],
                "messages": [
                    {"role": "user", "content": "Run the failing script"},
                    {"role": "assistant", "content": [{"type": "tool_use", "id": "toolu_1", "name": "shell", "input": {"command": "./fail.sh"}}]},
                    {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "toolu_1", "content": "exit 1", "is_error": true}]}
                ]
            }),
            SessionMetadata::default(),
        )
        .expect("prepare");
    let result = &prepared.payload["messages"][2]["content"][0];
    assert_eq!(result["type"], "tool_result");
    assert_eq!(result["tool_use_id"], "toolu_1");
    assert_eq!(result["is_error"], true);
}

#[tokio::test]
async fn test_streamed_text_markup_reaches_anthropic_client_as_tool_use() {
    let pipeline = HubPipeline::with_defaults();
    let prepared = pipeline
        .prepare_request(
            Protocol::Anthropic,
            Protocol::OpenAI,
            json!({
                "model": "gpt-4o",
                "max_tokens": 64,
                "stream": true,
                "tools": [{"name": "echo", "input_schema": {"type": "object", "properties": {"text": {"type": "string"}}}}],
                "messages": [{"role": "user", "content": "Say hi through the echo tool"}]
            }),
            SessionMetadata::default(),
        )
        .expect("prepare");

    let chunk = json!({
        "id": "chatcmpl-7",
        "object": "chat.completion.chunk",
        "created": 1,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "delta": {"role": "assistant", "content": r#"<tool_call>{"name":"echo","arguments":{"text":"hi"}}</tool_call>"#},
            "finish_reason": "stop"
        }]
    });
    let upstream = futures::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(format!(
        "data: {}\n\ndata: [DONE]\n\n",
        chunk
    )))]);

    let frames: Vec<Bytes> = pipeline
        .convert_stream(&prepared.state, upstream)
        .expect("translator")
        .map(|frame| frame.expect("frame"))
        .collect()
        .await;
    let body: String = frames.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect();

    assert!(!body.contains("text_delta"), "markup leaked as text: {}", body);
    assert!(body.contains("\"tool_use\""));
    assert!(body.contains("\"name\":\"echo\""));
    assert!(body.contains("\"stop_reason\":\"tool_use\""));
}
