use smart_locator::error::OracleError;
use smart_locator::oracle::backend::{MockTextInference, TextInference};
use smart_locator::oracle::reply::OracleReply;

mod common;
use common::LOGIN_REPLY;

// ============================================================================
// Reply shapes
// ============================================================================

#[test]
fn bare_object_is_a_mapping() {
    assert!(matches!(OracleReply::parse(LOGIN_REPLY), OracleReply::Mapping(_)));
}

#[test]
fn fenced_object_is_a_mapping() {
    let fenced = format!("```json\n{}\n```", LOGIN_REPLY);
    assert!(matches!(OracleReply::parse(&fenced), OracleReply::Mapping(_)));
}

#[test]
fn tag_on_the_same_line_as_the_object_is_a_mapping() {
    let reply = OracleReply::parse(
        "```json {\"login_button\": {\"primary_selector\": \"#go\", \"tag\": \"button\"}}\n```",
    );
    assert!(matches!(reply, OracleReply::Mapping(_)));
    assert!(reply.into_elements().unwrap().contains_key("login_button"));
}

#[test]
fn single_item_list_is_unwrapped() {
    let wrapped = format!("[{}]", LOGIN_REPLY);
    let reply = OracleReply::parse(&wrapped);
    assert!(matches!(reply, OracleReply::UnwrappedList(_)));

    let bare = OracleReply::parse(LOGIN_REPLY).into_elements().unwrap();
    assert_eq!(reply.into_elements().unwrap(), bare);
}

#[test]
fn other_shapes_are_malformed() {
    let cases = [
        "I'm sorry, I can't see any elements.",
        "[]",
        "[{\"a\": 1}, {\"b\": 2}]",
        "[\"login\"]",
        "\"login_button\"",
        "42",
        "",
    ];
    for raw in cases {
        assert!(
            matches!(OracleReply::parse(raw), OracleReply::Malformed(_)),
            "{raw:?} should be malformed"
        );
    }
}

// ============================================================================
// Element validation
// ============================================================================

#[test]
fn empty_mapping_is_rejected() {
    let err = OracleReply::parse("{}").into_elements().unwrap_err();
    assert!(err.contains("no elements"));
}

#[test]
fn descriptor_without_tag_is_rejected() {
    let raw = r#"{ "email_field": { "primary_selector": "input#email" } }"#;
    assert!(OracleReply::parse(raw).into_elements().is_err());
}

#[test]
fn non_object_descriptor_is_rejected() {
    let raw = r#"{ "email_field": "input#email" }"#;
    assert!(OracleReply::parse(raw).into_elements().is_err());
}

#[test]
fn blank_tag_is_rejected() {
    let raw = r#"{ "email_field": { "primary_selector": "input#email", "tag": "" } }"#;
    let err = OracleReply::parse(raw).into_elements().unwrap_err();
    assert!(err.contains("email_field"));
}

#[test]
fn missing_text_defaults_to_empty() {
    let raw = r#"{ "email_field": { "primary_selector": "input#email", "tag": "input" } }"#;
    let elements = OracleReply::parse(raw).into_elements().unwrap();
    assert_eq!(elements["email_field"].text, "");
}

// ============================================================================
// Mock backend
// ============================================================================

#[test]
fn mock_returns_canned_reply() {
    let oracle = MockTextInference::new(LOGIN_REPLY);
    assert_eq!(oracle.infer_text("anything").unwrap(), LOGIN_REPLY);
}

#[test]
fn blank_mock_reply_is_empty_response() {
    let oracle = MockTextInference::new("  ");
    assert!(matches!(oracle.infer_text("anything"), Err(OracleError::EmptyResponse)));
}
