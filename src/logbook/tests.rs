use super::*;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn api_log_appends_one_line_per_call() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let log = ApiCallLog::new(temp_dir.path());

    log.record("embed_question", json!({"total_tokens": 12}), json!({"ok": true}))
        .expect("should record call");
    log.record("generate_answer", json!({"total_tokens": 80}), json!({"ok": true}))
        .expect("should record call");

    let today = Utc::now().date_naive();
    let records = log.read_day(today).expect("should read today's log");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].method, "embed_question");
    assert_eq!(records[0].usage_info, json!({"total_tokens": 12}));
    assert_eq!(records[1].method, "generate_answer");
}

#[test]
fn api_log_file_is_keyed_by_date() {
    let log = ApiCallLog::new("logs");
    let date = NaiveDate::from_ymd_opt(2025, 6, 16).expect("valid date");

    assert_eq!(
        log.file_for(date),
        PathBuf::from("logs/api_log_2025-06-16.jsonl")
    );
}

#[test]
fn read_day_with_no_file_is_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let log = ApiCallLog::new(temp_dir.path());

    let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let records = log.read_day(date).expect("should tolerate missing file");
    assert!(records.is_empty());
}

#[test]
fn question_log_records_question_without_image() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let log = QuestionLog::new(temp_dir.path());

    log.record("  cat vs dog?  ", None).expect("should record");

    let content =
        std::fs::read_to_string(log.file_path()).expect("should read question archive");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);

    let record: QuestionRecord = serde_json::from_str(lines[0]).expect("line should parse");
    assert_eq!(record.question, "cat vs dog?");
    assert_eq!(record.image_base64, None);
    // absent image must not appear as a null field
    assert!(!lines[0].contains("image_base64"));
}

#[test]
fn question_log_keeps_raw_image_payload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let log = QuestionLog::new(temp_dir.path());

    log.record("what is this chart?", Some("aGVsbG8="))
        .expect("should record");
    log.record("and this one?", None).expect("should record");

    let content =
        std::fs::read_to_string(log.file_path()).expect("should read question archive");
    let records: Vec<QuestionRecord> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("line should parse"))
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].image_base64.as_deref(), Some("aGVsbG8="));
    assert_eq!(records[1].image_base64, None);
}
