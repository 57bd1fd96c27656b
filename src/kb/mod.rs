// Knowledge-base formatting: the document model, the text cleaner, and the
// offline tool that merges the scraped forum and course-content dumps into
// a single formatted file.

pub mod embed;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use fancy_regex::Regex;
use itertools::Itertools;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::crawler::PageRecord;
use crate::forum::SavedPost;

/// File name of the merged, cleaned knowledge base inside the KB directory.
pub const FORMATTED_KB_FILE: &str = "formatted_scraped_kb.json";

/// One cleaned document, ready for embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub title: String,
    pub tags: Vec<String>,
    pub author: Vec<String>,
    pub url: String,
    pub text: String,
}

/// Token usage recorded next to each embedded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCallInfo {
    pub total_tokens: u64,
}

/// A knowledge document together with its embedding vector; the row format
/// of the embeddings file consumed by the vector store at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    pub embeddings: Vec<f32>,
    pub data: KnowledgeDocument,
    pub api_call_info: ApiCallInfo,
}

static FRONTMATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---[\s\S]*?---\n").expect("valid frontmatter pattern"));
static TABLE_DIVIDERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|(?:\s*:?-{2,}:?\s*\|)+").expect("valid table-divider pattern")
});
static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Reduce Markdown- or HTML-rich text to one line of plain text.
///
/// YAML frontmatter is dropped, links collapse to their visible labels,
/// images disappear entirely, heading markers and table dividers are
/// removed, smart punctuation is normalized, and embedded HTML is stripped.
#[inline]
pub fn clean_text(raw: &str) -> String {
    let without_frontmatter = FRONTMATTER.replace(raw, "");

    let mut plain = String::with_capacity(without_frontmatter.len());
    let mut image_depth = 0usize;

    for event in Parser::new(&without_frontmatter) {
        match event {
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            _ if image_depth > 0 => {}
            Event::Text(text) => plain.push_str(&text),
            Event::Code(code) => plain.push_str(&code),
            Event::Html(html) | Event::InlineHtml(html) => plain.push_str(&html_to_text(&html)),
            Event::SoftBreak | Event::HardBreak => plain.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item) => plain.push(' '),
            _ => {}
        }
    }

    let plain = TABLE_DIVIDERS.replace_all(&plain, "");
    let plain = plain
        .replace('\u{2026}', "")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"");

    WHITESPACE_RUNS.replace_all(&plain, " ").trim().to_string()
}

/// Strip HTML markup, keeping only the text content.
#[inline]
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<String>()
}

/// Merge the scraped forum posts and crawled course pages into the
/// formatted knowledge-base file. Returns the number of documents written.
#[inline]
pub fn build_knowledge_base(config: &Config) -> Result<usize> {
    let forum_path = config.paths.forum_content_dir.join("discourse_posts.json");
    let forum_file = File::open(&forum_path)
        .with_context(|| format!("Failed to open forum dump: {}", forum_path.display()))?;
    let posts: Vec<SavedPost> = serde_json::from_reader(forum_file)
        .with_context(|| format!("Failed to parse forum dump: {}", forum_path.display()))?;

    let mut documents: Vec<KnowledgeDocument> = posts
        .iter()
        .map(|post| KnowledgeDocument {
            title: post.topic_title.clone(),
            tags: post.tags.clone(),
            author: vec![post.author.clone()],
            url: post.url.clone(),
            text: clean_text(&post.content),
        })
        .collect();
    info!("Formatted {} forum posts", documents.len());

    let manifest_path = config.paths.course_content_dir.join("metadata.json");
    let manifest_file = File::open(&manifest_path)
        .with_context(|| format!("Failed to open crawl manifest: {}", manifest_path.display()))?;
    let pages: Vec<PageRecord> = serde_json::from_reader(manifest_file)
        .with_context(|| format!("Failed to parse crawl manifest: {}", manifest_path.display()))?;

    let mut page_count = 0usize;
    for page in pages
        .into_iter()
        .unique_by(|page| page.filename.clone())
    {
        let page_path = config.paths.course_content_dir.join(&page.filename);
        let raw = match fs::read_to_string(&page_path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping unreadable page {}: {}", page_path.display(), e);
                continue;
            }
        };

        documents.push(KnowledgeDocument {
            title: page.title,
            tags: Vec::new(),
            author: Vec::new(),
            url: page.original_url,
            text: clean_text(&raw),
        });
        page_count += 1;
    }
    info!("Formatted {} course-content pages", page_count);

    fs::create_dir_all(&config.paths.kb_dir).with_context(|| {
        format!("Failed to create KB directory: {}", config.paths.kb_dir.display())
    })?;
    let out_path = config.paths.kb_dir.join(FORMATTED_KB_FILE);
    let out_file = File::create(&out_path)
        .with_context(|| format!("Failed to create KB file: {}", out_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(out_file), &documents)
        .context("Failed to write formatted knowledge base")?;

    info!(
        "Wrote {} documents to {}",
        documents.len(),
        out_path.display()
    );
    Ok(documents.len())
}
