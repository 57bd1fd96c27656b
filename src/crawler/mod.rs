// Course-content crawler: renders the course site in a headless browser,
// converts each page's article to Markdown, and writes one file per page
// plus a metadata manifest for the knowledge-base formatter.

pub mod browser;


use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fs::{self, File};
use std::io::BufWriter;
use tracing::{info, warn};

use self::browser::{BrowserConfig, CourseBrowser};
use crate::config::Config;

/// Entry point of the course-content site.
const BASE_URL: &str = "https://tds.s-anand.net/#/2025-01/";
/// Only links under this origin are followed.
const BASE_ORIGIN: &str = "https://tds.s-anand.net";
/// The rendered article container on every course page.
const ARTICLE_SELECTOR: &str = "article.markdown-section#main";
/// Manifest of crawled pages, consumed by the knowledge-base formatter.
const MANIFEST_FILE: &str = "metadata.json";

/// One crawled page in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: String,
    pub filename: String,
    pub original_url: String,
    pub downloaded_at: String,
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlSummary {
    pub pages_saved: usize,
}

/// Crawl the course site breadth-first, writing one Markdown file per page
/// and the manifest. Per-page failures are logged and skipped.
#[inline]
pub fn crawl_course_content(config: &Config) -> Result<CrawlSummary> {
    let output_dir = &config.paths.course_content_dir;
    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create crawl output directory: {}", output_dir.display())
    })?;

    let browser = CourseBrowser::launch(BrowserConfig::default())?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([BASE_URL.to_string()]);
    let mut manifest: Vec<PageRecord> = Vec::new();

    while let Some(url) = queue.pop_front() {
        if !visited.insert(url.clone()) {
            continue;
        }
        info!("Visiting: {}", url);

        let capture = match browser.open_page(&url, ARTICLE_SELECTOR) {
            Ok(capture) => capture,
            Err(e) => {
                warn!("Error loading {}: {}", url, e);
                continue;
            }
        };

        let title = page_title(&capture.title, visited.len());
        let filename = format!("{}.md", sanitize_filename(&title));
        let downloaded_at = Utc::now().to_rfc3339();

        let markdown = html2md::parse_html(&capture.article_html);
        let page = format!(
            "{}\n{}",
            page_frontmatter(&title, &url, &downloaded_at),
            markdown
        );

        let page_path = output_dir.join(&filename);
        if let Err(e) = fs::write(&page_path, page) {
            warn!("Failed to write {}: {}", page_path.display(), e);
            continue;
        }

        manifest.push(PageRecord {
            title,
            filename,
            original_url: url,
            downloaded_at,
        });

        for link in capture.links {
            if is_internal_link(&link) && !visited.contains(&link) {
                queue.push_back(link);
            }
        }
    }

    let manifest_path = output_dir.join(MANIFEST_FILE);
    let manifest_file = File::create(&manifest_path)
        .with_context(|| format!("Failed to create manifest: {}", manifest_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(manifest_file), &manifest)
        .context("Failed to write crawl manifest")?;

    info!("Saved {} course pages to {}", manifest.len(), output_dir.display());

    Ok(CrawlSummary {
        pages_saved: manifest.len(),
    })
}

/// A link is crawlable when it stays on the course origin and addresses an
/// SPA route.
#[inline]
pub fn is_internal_link(link: &str) -> bool {
    link.contains(BASE_ORIGIN) && link.contains("/#/")
}

/// Page title from the browser title, with a positional fallback.
#[inline]
pub fn page_title(raw_title: &str, page_number: usize) -> String {
    let title = raw_title
        .split(" - ")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    if title.is_empty() {
        format!("page_{}", page_number)
    } else {
        title
    }
}

/// Make a title safe to use as a file name.
#[inline]
pub fn sanitize_filename(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|character| match character {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            ' ' => '_',
            other => other,
        })
        .collect()
}

/// YAML frontmatter block written at the top of each page file.
#[inline]
pub fn page_frontmatter(title: &str, url: &str, downloaded_at: &str) -> String {
    format!(
        "---\ntitle: \"{}\"\noriginal_url: \"{}\"\ndownloaded_at: \"{}\"\n---\n",
        title.replace('"', "'"),
        url,
        downloaded_at
    )
}
