use super::*;
use tempfile::TempDir;

#[test]
fn clean_text_strips_yaml_frontmatter() {
    let raw = "---\ntitle: \"Course Intro\"\noriginal_url: \"https://example.com/#/intro\"\n---\n\nWelcome to the course.";

    assert_eq!(clean_text(raw), "Welcome to the course.");
}

#[test]
fn clean_text_reduces_links_to_labels() {
    let raw = "See the [grading doc](https://example.com/grading) for details.";

    assert_eq!(clean_text(raw), "See the grading doc for details.");
}

#[test]
fn clean_text_drops_images_entirely() {
    let raw = "Before ![a diagram](https://example.com/d.png) after.";

    assert_eq!(clean_text(raw), "Before after.");
}

#[test]
fn clean_text_removes_heading_markers() {
    let raw = "# Module 1\n\nContent of module one.\n\n## Details\n\nMore content.";
    let cleaned = clean_text(raw);

    assert!(!cleaned.contains('#'));
    assert!(cleaned.contains("Module 1"));
    assert!(cleaned.contains("Content of module one."));
}

#[test]
fn clean_text_strips_embedded_html() {
    let raw = "Use <code>pip install</code> to get started, <b>not</b> conda.";

    assert_eq!(clean_text(raw), "Use pip install to get started, not conda.");
}

#[test]
fn clean_text_removes_table_dividers() {
    let raw = "| Model | Tokens |\n| --- | --- |\n| gpt-4o-mini | 128k |";
    let cleaned = clean_text(raw);

    assert!(!cleaned.contains("---"));
    assert!(cleaned.contains("gpt-4o-mini"));
}

#[test]
fn clean_text_normalizes_smart_punctuation() {
    let raw = "It\u{2019}s \u{201C}quoted\u{201D} and trailing\u{2026}";

    assert_eq!(clean_text(raw), "It's \"quoted\" and trailing");
}

#[test]
fn clean_text_yields_a_single_line() {
    let raw = "line one\nline two\n\nline three";
    let cleaned = clean_text(raw);

    assert!(!cleaned.contains('\n'));
    assert_eq!(cleaned, "line one line two line three");
}

#[test]
fn html_to_text_keeps_only_text_content() {
    let html = "<p>Hello <a href=\"https://example.com\">world</a><br></p>";

    assert_eq!(html_to_text(html), "Hello world");
}

fn sample_post(post_id: u64, content: &str) -> crate::forum::SavedPost {
    crate::forum::SavedPost {
        topic_id: 11,
        topic_title: "Week 1 doubts".to_string(),
        tags: vec!["week-1".to_string()],
        post_id,
        post_number: 1,
        author: "student_a".to_string(),
        created_at: "2025-02-01T10:00:00.000Z".to_string(),
        updated_at: "2025-02-01T10:00:00.000Z".to_string(),
        reply_to_post_number: None,
        reply_count: 0,
        url: format!("https://forum.example.com/t/11/posts.json?post_ids[]={post_id}"),
        content: content.to_string(),
    }
}

#[test]
fn build_merges_forum_and_course_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let forum_dir = temp_dir.path().join("forum");
    let content_dir = temp_dir.path().join("content");
    std::fs::create_dir_all(&forum_dir).expect("should create forum dir");
    std::fs::create_dir_all(&content_dir).expect("should create content dir");

    let posts = vec![sample_post(1, "<p>Use <b>gpt-4o-mini</b> here.</p>")];
    std::fs::write(
        forum_dir.join("discourse_posts.json"),
        serde_json::to_string(&posts).expect("should serialize posts"),
    )
    .expect("should write forum dump");

    let manifest = serde_json::json!([
        {
            "title": "Course Intro",
            "filename": "Course_Intro.md",
            "original_url": "https://example.com/#/intro",
            "downloaded_at": "2025-06-01T00:00:00Z"
        },
        {
            "title": "Course Intro (duplicate)",
            "filename": "Course_Intro.md",
            "original_url": "https://example.com/#/intro",
            "downloaded_at": "2025-06-01T00:00:00Z"
        }
    ]);
    std::fs::write(
        content_dir.join("metadata.json"),
        manifest.to_string(),
    )
    .expect("should write manifest");
    std::fs::write(
        content_dir.join("Course_Intro.md"),
        "---\ntitle: \"Course Intro\"\n---\n\nWelcome to [the course](https://example.com).",
    )
    .expect("should write page");

    let mut config = crate::config::Config::default();
    config.paths.forum_content_dir = forum_dir;
    config.paths.course_content_dir = content_dir;
    config.paths.kb_dir = temp_dir.path().to_path_buf();

    let count = build_knowledge_base(&config).expect("should build knowledge base");
    assert_eq!(count, 2, "duplicate manifest entries must collapse");

    let formatted = std::fs::read_to_string(temp_dir.path().join(FORMATTED_KB_FILE))
        .expect("should read formatted KB");
    let documents: Vec<KnowledgeDocument> =
        serde_json::from_str(&formatted).expect("should parse formatted KB");

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].author, vec!["student_a".to_string()]);
    assert_eq!(documents[0].text, "Use gpt-4o-mini here.");
    assert!(documents[1].author.is_empty());
    assert_eq!(documents[1].text, "Welcome to the course.");
}
