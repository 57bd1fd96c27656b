use super::*;
use crate::kb::{ApiCallInfo, KnowledgeDocument};
use tempfile::TempDir;

const TEST_DIMENSION: u32 = 4;

fn test_document(index: usize) -> EmbeddedDocument {
    let mut vector = vec![0.1, 0.2, 0.3, 0.4];
    for (position, value) in vector.iter_mut().enumerate() {
        *value += (index as f32).mul_add(0.01, position as f32 * 0.001);
    }

    EmbeddedDocument {
        embeddings: vector,
        data: KnowledgeDocument {
            title: format!("Doc {}", index),
            tags: vec!["week-1".to_string()],
            author: vec!["course_ta".to_string()],
            url: format!("https://example.com/doc/{}", index),
            text: format!("This is the text of document {}", index),
        },
        api_call_info: ApiCallInfo { total_tokens: 10 },
    }
}

fn test_config(documents: &[EmbeddedDocument]) -> (crate::config::Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let embeddings_path = temp_dir.path().join("kb_with_embeddings.json");
    std::fs::write(
        &embeddings_path,
        serde_json::to_string(documents).expect("should serialize documents"),
    )
    .expect("should write embeddings file");

    let mut config = crate::config::Config::default();
    config.base_dir = temp_dir.path().to_path_buf();
    config.api.embedding_dimension = TEST_DIMENSION;
    config.paths.embeddings_file = embeddings_path;

    (config, temp_dir)
}

#[tokio::test]
async fn initialize_loads_every_document() {
    let documents: Vec<EmbeddedDocument> = (0..3).map(test_document).collect();
    let (config, _temp_dir) = test_config(&documents);

    let store = KnowledgeStore::connect(&config)
        .await
        .expect("should connect");
    let count = store.initialize().await.expect("should initialize");

    assert_eq!(count, 3);
    assert_eq!(store.count_rows().await.expect("should count"), 3);
}

#[tokio::test]
async fn reinitialize_is_a_no_op_on_a_populated_store() {
    let documents: Vec<EmbeddedDocument> = (0..3).map(test_document).collect();
    let (config, _temp_dir) = test_config(&documents);

    let store = KnowledgeStore::connect(&config)
        .await
        .expect("should connect");
    store.initialize().await.expect("should initialize");

    // a second initialization must not add rows, even though the file is
    // still present and would load 3 more
    let count = store.initialize().await.expect("should re-initialize");
    assert_eq!(count, 3);
    assert_eq!(store.count_rows().await.expect("should count"), 3);
}

#[tokio::test]
async fn query_returns_at_most_k_docs_with_metadata() {
    let documents: Vec<EmbeddedDocument> = (0..3).map(test_document).collect();
    let (config, _temp_dir) = test_config(&documents);

    let store = KnowledgeStore::connect(&config)
        .await
        .expect("should connect");
    store.initialize().await.expect("should initialize");

    let results = store
        .query(&[0.1, 0.2, 0.3, 0.4], DEFAULT_TOP_K)
        .await
        .expect("should query");

    assert!(!results.is_empty(), "populated store should return matches");
    assert!(results.len() <= DEFAULT_TOP_K);
    assert!(results.len() <= 3, "cannot return more than stored");
    for doc in &results {
        assert!(!doc.url.is_empty());
        assert!(!doc.text.is_empty());
    }
}

#[tokio::test]
async fn initialize_fails_without_embeddings_file() {
    let documents: Vec<EmbeddedDocument> = (0..1).map(test_document).collect();
    let (mut config, _temp_dir) = test_config(&documents);
    config.paths.embeddings_file = config.base_dir.join("missing.json");

    let store = KnowledgeStore::connect(&config)
        .await
        .expect("should connect");

    let result = store.initialize().await;
    assert!(matches!(result, Err(crate::TaError::Store(_))));
}

#[tokio::test]
async fn initialize_rejects_mismatched_dimensions() {
    let mut documents: Vec<EmbeddedDocument> = (0..2).map(test_document).collect();
    documents[1].embeddings = vec![0.5, 0.5];
    let (config, _temp_dir) = test_config(&documents);

    let store = KnowledgeStore::connect(&config)
        .await
        .expect("should connect");

    let result = store.initialize().await;
    assert!(matches!(result, Err(crate::TaError::Store(_))));
}
