// Embedding-generation tool: one hosted-API call per formatted document,
// written incrementally to a crash-resilient side file and finally as the
// JSON array the vector store bulk-loads at startup.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use tracing::info;

use super::{ApiCallInfo, EmbeddedDocument, FORMATTED_KB_FILE, KnowledgeDocument};
use crate::api::AipipeClient;
use crate::config::Config;

/// Embed every document in the formatted knowledge base. Returns the number
/// of embedded records written.
#[inline]
pub fn generate_embeddings(config: &Config) -> Result<usize> {
    let formatted_path = config.paths.kb_dir.join(FORMATTED_KB_FILE);
    let formatted_file = File::open(&formatted_path).with_context(|| {
        format!(
            "Failed to open formatted knowledge base: {}",
            formatted_path.display()
        )
    })?;
    let documents: Vec<KnowledgeDocument> = serde_json::from_reader(formatted_file)
        .with_context(|| {
            format!(
                "Failed to parse formatted knowledge base: {}",
                formatted_path.display()
            )
        })?;

    let client = AipipeClient::new(config)?;

    let scratch_path = config.embeddings_scratch_path();
    if let Some(parent) = scratch_path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create output directory: {}", parent.display())
        })?;
    }
    let mut scratch = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&scratch_path)
        .with_context(|| format!("Failed to open scratch file: {}", scratch_path.display()))?;

    let progress = ProgressBar::new(documents.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{pos}/{len} [{bar:40}] {msg}")
            .expect("valid progress template"),
    );

    let mut embedded = Vec::with_capacity(documents.len());
    for document in documents {
        progress.set_message(document.url.clone());

        let outcome = client
            .embed(&document.text, "embed_document")
            .with_context(|| format!("Failed to embed document: {}", document.url))?;

        let record = EmbeddedDocument {
            embeddings: outcome.vector,
            data: document,
            api_call_info: ApiCallInfo {
                total_tokens: outcome.total_tokens,
            },
        };

        let mut line =
            serde_json::to_string(&record).context("Failed to serialize embedded document")?;
        line.push('\n');
        scratch
            .write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to {}", scratch_path.display()))?;

        embedded.push(record);
        progress.inc(1);
    }
    progress.finish_with_message("embedding complete");

    let out_path = &config.paths.embeddings_file;
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create output directory: {}", parent.display())
        })?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("Failed to create embeddings file: {}", out_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(out_file), &embedded)
        .context("Failed to write embeddings file")?;

    info!(
        "Wrote {} embedded documents to {}",
        embedded.len(),
        out_path.display()
    );
    Ok(embedded.len())
}
