// Discourse forum scraper: cookie-authenticated topic pagination, per-post
// fetching with an append-only checkpoint journal, and a merged JSON dump
// for the knowledge-base formatter.

pub mod journal;


use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufWriter;
use std::time::Duration;
use tracing::{debug, info, warn};

use self::journal::Journal;
use crate::config::Config;
use crate::kb::html_to_text;

/// Category listing path of the course's knowledge-base forum category.
const CATEGORY_PATH: &str = "c/courses/tds-kb/34";
/// Cached topic listing, reused across runs.
const TOPICS_CACHE_FILE: &str = "__discourse_topics.json";
/// Final merged dump consumed by the knowledge-base formatter.
const POSTS_OUTPUT_FILE: &str = "discourse_posts.json";

/// Journal flush cadence and the pause taken at each checkpoint.
const CHECKPOINT_EVERY: usize = 50;
const CHECKPOINT_PAUSE: Duration = Duration::from_secs(5);

const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Only topics created inside this window are scraped.
const DATE_FROM: &str = "2025-01-01T00:00:00Z";
const DATE_TO: &str = "2025-04-14T00:00:00Z";

/// One scraped forum post; also the journal entry type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPost {
    pub topic_id: u64,
    pub topic_title: String,
    pub tags: Vec<String>,
    pub post_id: u64,
    pub post_number: u64,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
    pub reply_to_post_number: Option<u64>,
    pub reply_count: u64,
    pub url: String,
    pub content: String,
}

/// One row of the paginated topic listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: u64,
    post_number: u64,
    username: String,
    created_at: String,
    updated_at: String,
    reply_to_post_number: Option<u64>,
    #[serde(default)]
    reply_count: u64,
    cooked: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrapeSummary {
    /// Posts in the journal after the run
    pub posts_total: usize,
    /// Posts newly fetched by this run
    pub posts_fetched: usize,
}

/// Authenticated session against the Discourse instance, carrying the two
/// browser-extracted cookies on every request.
pub struct ForumSession {
    agent: ureq::Agent,
    base_url: String,
    cookie_header: String,
}

impl ForumSession {
    #[inline]
    pub fn connect(config: &Config) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            agent,
            base_url: config.forum.base_url.trim_end_matches('/').to_string(),
            cookie_header: format!(
                "_t={}; _forum_session={}",
                config.forum.auth_token.trim(),
                config.forum.session_token.trim()
            ),
        }
    }

    /// Check that the cookies still identify a logged-in user.
    #[inline]
    pub fn verify(&self) -> Result<bool> {
        let url = format!("{}/session/current.json", self.base_url);
        match self.get_json(&url) {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!("Session check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn get_json(&self, url: &str) -> Result<Value> {
        let text = self
            .agent
            .get(url)
            .header("Cookie", &self.cookie_header)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| anyhow!("GET {} failed: {}", url, e))?;

        serde_json::from_str(&text).with_context(|| format!("Non-JSON response from {}", url))
    }
}

/// Parse a Discourse timestamp, with or without fractional seconds.
#[inline]
pub fn parse_forum_date(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ"))
        .with_context(|| format!("Unparseable forum timestamp: {}", value))
}

/// Whether a topic creation date falls inside the fixed scrape window.
#[inline]
pub fn within_scrape_window(created_at: NaiveDateTime) -> bool {
    let from = parse_forum_date(DATE_FROM).expect("valid window start");
    let to = parse_forum_date(DATE_TO).expect("valid window end");
    from <= created_at && created_at <= to
}

/// Scrape the forum category into the journal and write the merged dump.
///
/// The journal is reloaded first, so a resumed run never re-fetches a post
/// whose id is already saved. Per-item failures are logged and skipped; an
/// expired login aborts before any scraping starts.
#[inline]
pub fn scrape_forum(config: &Config, limit_title_pages: Option<u32>) -> Result<ScrapeSummary> {
    let session = ForumSession::connect(config);
    if !session.verify()? {
        bail!("Forum login expired; refresh the browser cookies in the configuration");
    }

    fs::create_dir_all(&config.paths.forum_content_dir).with_context(|| {
        format!(
            "Failed to create forum output directory: {}",
            config.paths.forum_content_dir.display()
        )
    })?;

    let topics = load_or_fetch_topics(&session, config, limit_title_pages)?;
    let mut journal = Journal::load(&config.paths.checkpoint_file)?;

    let mut posts_fetched = 0;
    for topic in &topics {
        let created_at = match parse_forum_date(&topic.created_at) {
            Ok(created_at) => created_at,
            Err(e) => {
                warn!("Skipping topic {}: {}", topic.id, e);
                continue;
            }
        };
        if !within_scrape_window(created_at) {
            continue;
        }

        info!("Fetching posts for topic {} ({})", topic.id, topic.slug);
        posts_fetched += fetch_posts_for_topic(&session, topic, &mut journal)?;
    }
    journal.flush()?;

    let out_path = config.paths.forum_content_dir.join(POSTS_OUTPUT_FILE);
    let out_file = File::create(&out_path)
        .with_context(|| format!("Failed to create forum dump: {}", out_path.display()))?;
    let posts: Vec<&SavedPost> = journal.posts().collect();
    serde_json::to_writer_pretty(BufWriter::new(out_file), &posts)
        .context("Failed to write forum dump")?;

    info!(
        "Scraped {} new posts ({} total) into {}",
        posts_fetched,
        journal.len(),
        out_path.display()
    );

    Ok(ScrapeSummary {
        posts_total: journal.len(),
        posts_fetched,
    })
}

/// Paginate the category topic listing, or reuse the cached listing from a
/// previous run when present.
fn load_or_fetch_topics(
    session: &ForumSession,
    config: &Config,
    limit_title_pages: Option<u32>,
) -> Result<Vec<TopicSummary>> {
    let cache_path = config.paths.forum_content_dir.join(TOPICS_CACHE_FILE);
    if cache_path.exists() {
        info!("Loading topics from cache: {}", cache_path.display());
        let cache_file = File::open(&cache_path)
            .with_context(|| format!("Failed to open topic cache: {}", cache_path.display()))?;
        return serde_json::from_reader(cache_file)
            .with_context(|| format!("Failed to parse topic cache: {}", cache_path.display()));
    }

    let mut all_topics = Vec::new();
    let mut page = 0u32;

    loop {
        let url = format!(
            "{}/{}.json?page={}",
            session.base_url, CATEGORY_PATH, page
        );
        debug!("Fetching topic page {}", page);
        let data = session.get_json(&url)?;

        let topics_value = data["topic_list"]["topics"].clone();
        let topics: Vec<TopicSummary> = if topics_value.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(topics_value)
                .with_context(|| format!("Unexpected topic listing shape on page {}", page))?
        };
        if topics.is_empty() {
            break;
        }

        all_topics.extend(topics);
        page += 1;

        if limit_title_pages.is_some_and(|limit| page >= limit) {
            break;
        }
    }

    info!("Found {} topics in category {}", all_topics.len(), CATEGORY_PATH);

    let cache_file = File::create(&cache_path)
        .with_context(|| format!("Failed to create topic cache: {}", cache_path.display()))?;
    serde_json::to_writer(BufWriter::new(cache_file), &all_topics)
        .context("Failed to write topic cache")?;

    Ok(all_topics)
}

/// Fetch every not-yet-journaled post of one topic. Returns the number of
/// posts newly saved; per-post failures are logged and skipped.
fn fetch_posts_for_topic(
    session: &ForumSession,
    topic: &TopicSummary,
    journal: &mut Journal,
) -> Result<usize> {
    let stream_url = format!("{}/t/{}.json", session.base_url, topic.id);
    let data = match session.get_json(&stream_url) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to fetch post stream for topic {}: {}", topic.id, e);
            return Ok(0);
        }
    };

    let stream: Vec<u64> = match serde_json::from_value(data["post_stream"]["stream"].clone()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Unexpected post stream shape for topic {}: {}", topic.id, e);
            return Ok(0);
        }
    };

    let mut fetched = 0;
    for post_id in stream {
        if journal.contains(post_id) {
            debug!("Skipping post {}: already saved", post_id);
            continue;
        }

        if journal.pending_len() >= CHECKPOINT_EVERY {
            journal.flush()?;
            info!(
                "Checkpoint written; pausing for {}s",
                CHECKPOINT_PAUSE.as_secs()
            );
            std::thread::sleep(CHECKPOINT_PAUSE);
        }

        match fetch_single_post(session, topic, post_id) {
            Ok(Some(post)) => {
                journal.insert(post);
                fetched += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to fetch post {}: {}", post_id, e),
        }
    }

    Ok(fetched)
}

fn fetch_single_post(
    session: &ForumSession,
    topic: &TopicSummary,
    post_id: u64,
) -> Result<Option<SavedPost>> {
    let post_url = format!(
        "{}/t/{}/posts.json?post_ids[]={}&include_suggested=false",
        session.base_url, topic.id, post_id
    );

    debug!("Fetching post {}", post_id);
    let data = session.get_json(&post_url)?;

    let posts: Vec<RawPost> = serde_json::from_value(data["post_stream"]["posts"].clone())
        .with_context(|| format!("Unexpected post payload shape for post {}", post_id))?;
    let Some(post) = posts.into_iter().next() else {
        return Ok(None);
    };

    if post.id != post_id {
        warn!("Post id mismatch: expected {}, got {}", post_id, post.id);
        return Ok(None);
    }

    let content = html_to_text(&post.cooked).trim().to_string();
    if content.is_empty() {
        debug!("Skipping post {}: empty content", post_id);
        return Ok(None);
    }

    Ok(Some(SavedPost {
        topic_id: topic.id,
        topic_title: topic.title.clone(),
        tags: topic.tags.clone(),
        post_id: post.id,
        post_number: post.post_number,
        author: post.username,
        created_at: post.created_at,
        updated_at: post.updated_at,
        reply_to_post_number: post.reply_to_post_number,
        reply_count: post.reply_count,
        url: post_url,
        content,
    }))
}
