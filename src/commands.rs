use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use console::style;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::logbook::ApiCallLog;
use crate::store::KnowledgeStore;

/// Start the HTTP server (initializes the vector store first).
#[inline]
pub async fn serve(config_dir: &Path) -> crate::Result<()> {
    let config = Config::load(config_dir).map_err(|e| crate::TaError::Config(e.to_string()))?;
    info!("Starting {} on {}", config.app_name, config.server.bind);
    crate::server::run_server(config).await
}

/// Scrape the forum category into the checkpoint journal and dump file.
#[inline]
pub fn scrape_forum(config_dir: &Path, limit_title_pages: Option<u32>) -> Result<()> {
    let config = Config::load(config_dir)?;
    let summary = crate::forum::scrape_forum(&config, limit_title_pages)?;

    println!(
        "Scraped {} new posts ({} total in journal)",
        summary.posts_fetched, summary.posts_total
    );
    println!(
        "Dump written to {}",
        config.paths.forum_content_dir.join("discourse_posts.json").display()
    );
    Ok(())
}

/// Crawl the course-content site into Markdown files plus a manifest.
#[inline]
pub fn scrape_content(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let summary = crate::crawler::crawl_course_content(&config)?;

    println!(
        "Saved {} course pages to {}",
        summary.pages_saved,
        config.paths.course_content_dir.display()
    );
    Ok(())
}

/// Merge the scraped dumps into the formatted knowledge base.
#[inline]
pub fn build_kb(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let documents = crate::kb::build_knowledge_base(&config)?;

    println!("Formatted {} documents", documents);
    Ok(())
}

/// Embed every formatted document and write the embeddings file.
#[inline]
pub fn make_embeds(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;
    let documents = crate::kb::embed::generate_embeddings(&config)?;

    println!(
        "Embedded {} documents into {}",
        documents,
        config.paths.embeddings_file.display()
    );
    Ok(())
}

/// Report the health of the deployment's moving parts.
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir)?;

    println!("{}", style(&config.app_name).bold());
    println!("{}", "=".repeat(50));

    println!("Embeddings file:");
    if config.paths.embeddings_file.exists() {
        println!("  present at {}", config.paths.embeddings_file.display());
    } else {
        println!(
            "  {} (run `course-ta make-embeds`)",
            style("missing").red()
        );
    }

    println!("Vector store:");
    match KnowledgeStore::connect(&config).await {
        Ok(store) => match store.count_rows().await {
            Ok(count) => println!("  connected, {} rows", count),
            Err(_) => println!("  connected, table not created yet"),
        },
        Err(e) => println!("  {}: {}", style("unavailable").red(), e),
    }

    println!("API key:");
    if config.api.api_key.trim().is_empty() {
        println!("  {} (run `course-ta config`)", style("unset").red());
    } else {
        println!("  configured for {}", config.api.base_url);
    }

    println!("Forum cookies:");
    if config.forum.auth_token.trim().is_empty() || config.forum.session_token.trim().is_empty() {
        println!("  {} (scraping will fail)", style("unset").yellow());
    } else {
        println!("  configured for {}", config.forum.base_url);
    }

    println!("Logs:");
    println!("  API calls: {}", config.paths.api_log_dir.display());
    println!("  Questions: {}", config.paths.question_log_dir.display());

    Ok(())
}

/// Print one day's API-call log in a compact per-record view.
#[inline]
pub fn show_logs(config_dir: &Path, date: Option<String>) -> Result<()> {
    let config = Config::load(config_dir)?;

    if !config.debug {
        println!("Debug mode is disabled; enable it with `course-ta config` to view logs.");
        return Ok(());
    }

    let date = match date {
        Some(date) => NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", date))?,
        None => Utc::now().date_naive(),
    };

    let log = ApiCallLog::new(&config.paths.api_log_dir);
    let records = log.read_day(date)?;

    if records.is_empty() {
        println!("No log file found for date: {}", date);
        return Ok(());
    }

    println!("Showing logs from {}:", log.file_for(date).display());
    println!();

    for (index, record) in records.iter().enumerate() {
        let preview: String = record
            .response_data
            .to_string()
            .chars()
            .take(120)
            .collect();

        println!(
            "[{}] {} | Method: {}",
            index + 1,
            record.timestamp,
            style(&record.method).bold()
        );
        println!("     Usage: {}", record.usage_info);
        println!("     Response Preview: {}...", preview);
        println!("{}", "-".repeat(80));
    }

    Ok(())
}
