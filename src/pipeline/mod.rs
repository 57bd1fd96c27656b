// The answer pipeline: OCR fusion, question archiving, embedding,
// retrieval, prompt assembly, and answer synthesis, in that order. This is
// the only code on the request path.

pub mod prompt;


use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::AipipeClient;
use crate::logbook::QuestionLog;
use crate::ocr;
use crate::store::{DEFAULT_TOP_K, KnowledgeSearch};

/// One source link returned with the answer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceLink {
    pub url: String,
    pub text: String,
}

/// The response payload of the ask endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub links: Vec<SourceLink>,
}

/// Answer pipeline over an injected search handle, the hosted-API client,
/// and the question archive.
pub struct AskPipeline<S> {
    store: Arc<S>,
    client: Arc<AipipeClient>,
    questions: QuestionLog,
}

impl<S: KnowledgeSearch> AskPipeline<S> {
    #[inline]
    pub fn new(store: Arc<S>, client: Arc<AipipeClient>, questions: QuestionLog) -> Self {
        Self {
            store,
            client,
            questions,
        }
    }

    /// Answer one student question, optionally fusing OCR text from a
    /// base64-encoded image.
    ///
    /// The raw question (and image) is archived before any answer work.
    /// OCR failures degrade to "no image text"; embedding, retrieval, and
    /// completion failures propagate as request failures.
    #[inline]
    pub async fn answer(&self, question: &str, image: Option<&str>) -> Result<AskResponse> {
        let image_text = image.and_then(|image| match ocr::extract_text_from_base64(image) {
            Ok(text) => ocr::scrub(&text),
            Err(e) => {
                warn!("OCR failed, continuing without image text: {}", e);
                None
            }
        });

        if let Err(e) = self.questions.record(question, image) {
            warn!("Failed to archive question: {}", e);
        }

        let query = match &image_text {
            Some(image_text) => format!("{}\n{}", question, image_text),
            None => question.to_string(),
        };

        let embedding = self
            .client
            .embed(&query, "embed_question")
            .context("Failed to embed question")?;

        let documents = self.store.query(&embedding.vector, DEFAULT_TOP_K).await?;
        debug!("Retrieved {} documents for question", documents.len());

        let source_texts: Vec<String> = documents
            .iter()
            .map(|document| document.text.clone())
            .collect();
        let messages = prompt::build_messages(question, &source_texts, image_text.as_deref());

        let answer = self
            .client
            .complete(&messages, "generate_answer")
            .context("Failed to generate answer")?;

        let links = documents
            .into_iter()
            .map(|document| SourceLink {
                url: document.url,
                text: document.text,
            })
            .collect();

        Ok(AskResponse { answer, links })
    }
}
