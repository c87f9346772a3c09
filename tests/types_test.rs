use serde_json::json;
use wayfinder::types::{ChatReply, ChatRequest, ChatTurn, Location, RenderRequest};

#[test]
fn chat_turn_constructor_sets_fields() {
    let turn = ChatTurn::new("user", "hello");
    assert_eq!(turn.role, "user");
    assert_eq!(turn.content, "hello");
    assert!(turn.is_user());
    assert!(!ChatTurn::new("assistant", "hi").is_user());
}

#[test]
fn provider_message_for_user_and_assistant() {
    let provider = ChatTurn::new("user", "hello")
        .as_provider_message()
        .expect("provider message");
    assert_eq!(provider, json!({"role": "user", "content": "hello"}));

    let provider = ChatTurn::new("assistant", "hi")
        .as_provider_message()
        .expect("provider message");
    assert_eq!(provider["role"], "assistant");
}

#[test]
fn other_roles_have_no_provider_message() {
    assert!(ChatTurn::new("system", "x").as_provider_message().is_none());
    assert!(ChatTurn::new("tool", "x").as_provider_message().is_none());
}

#[test]
fn chat_turn_accepts_message_alias() {
    let turn: ChatTurn = serde_json::from_value(json!({"role": "user", "message": "hi"})).unwrap();
    assert_eq!(turn.content, "hi");

    let turn: ChatTurn = serde_json::from_value(json!({"role": "user"})).unwrap();
    assert_eq!(turn.content, "");
}

#[test]
fn chat_request_history_defaults_to_empty() {
    let request: ChatRequest = serde_json::from_value(json!({})).unwrap();
    assert!(request.history.is_empty());

    let request: ChatRequest = serde_json::from_value(json!({
        "history": [
            {"role": "user", "content": "Where is the library?"},
            {"role": "assistant", "content": "North campus."}
        ]
    }))
    .unwrap();
    assert_eq!(request.history.len(), 2);
    assert_eq!(request.history[1].role, "assistant");
}

#[test]
fn chat_request_rejects_non_array_history() {
    assert!(serde_json::from_value::<ChatRequest>(json!({"history": "hi"})).is_err());
    assert!(serde_json::from_value::<ChatRequest>(json!({"history": [1, 2]})).is_err());
}

#[test]
fn chat_reply_renders_html() {
    let reply = ChatReply::new("Call **now** at <desk>");
    assert_eq!(reply.reply, "Call **now** at <desk>");
    assert_eq!(
        reply.html,
        "<p>Call <strong>now</strong> at &lt;desk&gt;</p>"
    );

    let value = serde_json::to_value(&reply).unwrap();
    assert!(value.get("reply").is_some());
    assert!(value.get("html").is_some());
}

#[test]
fn empty_chat_reply_has_empty_html() {
    let reply = ChatReply::new("");
    assert_eq!(reply.html, "");
}

#[test]
fn location_wire_format() {
    let location: Location =
        serde_json::from_value(json!({"name": "Gate", "lat": 34.1, "lon": 74.8})).unwrap();
    assert_eq!(location.details, "");

    let value = serde_json::to_value(&location).unwrap();
    assert_eq!(
        value,
        json!({"name": "Gate", "details": "", "lat": 34.1, "lon": 74.8})
    );
}

#[test]
fn render_request_text_is_optional() {
    let request: RenderRequest = serde_json::from_value(json!({})).unwrap();
    assert!(request.text.is_none());
    let request: RenderRequest = serde_json::from_value(json!({"text": null})).unwrap();
    assert!(request.text.is_none());
}
