use super::*;

#[test]
fn ask_request_parses_with_image() {
    let body = r#"{"question": "cat vs dog?", "image": "aGVsbG8="}"#;
    let request: AskRequest = serde_json::from_str(body).expect("should parse");

    assert_eq!(request.question, "cat vs dog?");
    assert_eq!(request.image.as_deref(), Some("aGVsbG8="));
}

#[test]
fn ask_request_parses_without_image() {
    let body = r#"{"question": "cat vs dog?"}"#;
    let request: AskRequest = serde_json::from_str(body).expect("should parse");

    assert_eq!(request.question, "cat vs dog?");
    assert_eq!(request.image, None);
}

#[test]
fn ask_request_rejects_missing_question() {
    let body = r#"{"image": "aGVsbG8="}"#;
    assert!(serde_json::from_str::<AskRequest>(body).is_err());
}

#[test]
fn pipeline_failures_map_to_a_generic_500() {
    let error = AppError(anyhow::anyhow!("embedding endpoint unreachable"));
    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn ask_response_serializes_answer_and_links() {
    let response = AskResponse {
        answer: "Use gpt-4o-mini.".to_string(),
        links: vec![crate::pipeline::SourceLink {
            url: "https://example.com/doc/1".to_string(),
            text: "source text".to_string(),
        }],
    };

    let json = serde_json::to_value(&response).expect("should serialize");
    assert_eq!(json["answer"], "Use gpt-4o-mini.");
    assert_eq!(json["links"][0]["url"], "https://example.com/doc/1");
    assert_eq!(json["links"][0]["text"], "source text");
}
