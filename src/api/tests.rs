use super::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, log_dir: &std::path::Path) -> AipipeClient {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.api_key = "test-key".to_string();
    config.paths.api_log_dir = log_dir.to_path_buf();
    AipipeClient::new(&config).expect("should create client")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn embed_sends_model_and_input_and_logs_usage() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": "what is an embedding?"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.25, -0.5, 0.75]}],
            "usage": {"total_tokens": 6}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(test_client(&server.uri(), temp_dir.path()));
    let worker = Arc::clone(&client);
    let outcome = tokio::task::spawn_blocking(move || {
        worker.embed("what is an embedding?", "embed_question")
    })
    .await
    .expect("task should join")
    .expect("embed should succeed");

    assert_eq!(outcome.vector, vec![0.25, -0.5, 0.75]);
    assert_eq!(outcome.total_tokens, 6);

    let log = crate::logbook::ApiCallLog::new(temp_dir.path());
    let records = log
        .read_day(chrono::Utc::now().date_naive())
        .expect("should read log");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "embed_question");
    assert_eq!(records[0].usage_info, json!({"total_tokens": 6}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn complete_extracts_first_output_text() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{"content": [{"text": "Use gpt-4o-mini via the proxy."}]}],
            "usage": {"total_tokens": 42}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(test_client(&server.uri(), temp_dir.path()));
    let messages = vec![
        ChatMessage::system("You are a TA."),
        ChatMessage::user("Student Question: which model?"),
    ];

    let worker = Arc::clone(&client);
    let answer = tokio::task::spawn_blocking(move || worker.complete(&messages, "generate_answer"))
        .await
        .expect("task should join")
        .expect("complete should succeed");

    assert_eq!(answer, "Use gpt-4o-mini via the proxy.");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(test_client(&server.uri(), temp_dir.path()));
    let worker = Arc::clone(&client);
    let result =
        tokio::task::spawn_blocking(move || worker.embed("anything", "embed_question"))
            .await
            .expect("task should join");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [1.0]}],
            "usage": {"total_tokens": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(test_client(&server.uri(), temp_dir.path()));
    let worker = Arc::clone(&client);
    let outcome =
        tokio::task::spawn_blocking(move || worker.embed("retry me", "embed_question"))
            .await
            .expect("task should join")
            .expect("embed should succeed after retry");

    assert_eq!(outcome.vector, vec![1.0]);
}

#[test]
fn chat_message_constructors_set_roles() {
    assert_eq!(ChatMessage::system("rules").role, "system");
    assert_eq!(ChatMessage::user("question").role, "user");
}
