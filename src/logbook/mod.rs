// Append-only JSONL logs: the daily API-call log and the question archive.
// Each record is one complete line, so concurrent appenders can interleave
// without corrupting the file.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One record in the daily API-call log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLogRecord {
    pub timestamp: String,
    pub method: String,
    pub usage_info: Value,
    pub response_data: Value,
}

/// One record in the question archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub timestamp: String,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// Day-keyed JSONL log of outbound API calls.
#[derive(Debug, Clone)]
pub struct ApiCallLog {
    dir: PathBuf,
}

impl ApiCallLog {
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Append one call record to today's log file.
    #[inline]
    pub fn record(&self, method: &str, usage_info: Value, response_data: Value) -> Result<()> {
        let record = ApiLogRecord {
            timestamp: Utc::now().to_rfc3339(),
            method: method.to_string(),
            usage_info,
            response_data,
        };

        let path = self.file_for(Utc::now().date_naive());
        append_jsonl(&self.dir, &path, &record)?;
        debug!("Logged API call to {} ({})", path.display(), method);
        Ok(())
    }

    /// Read every record from one day's log file.
    #[inline]
    pub fn read_day(&self, date: NaiveDate) -> Result<Vec<ApiLogRecord>> {
        let path = self.file_for(date);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read API log: {}", path.display()))?;

        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: ApiLogRecord = serde_json::from_str(line)
                .with_context(|| format!("Malformed API log line {} in {}", i + 1, path.display()))?;
            records.push(record);
        }

        Ok(records)
    }

    #[inline]
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("api_log_{}.jsonl", date.format("%Y-%m-%d")))
    }
}

/// Archive of incoming questions, one JSONL file.
#[derive(Debug, Clone)]
pub struct QuestionLog {
    dir: PathBuf,
}

impl QuestionLog {
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Append one question (and its raw image, if any) to the archive.
    #[inline]
    pub fn record(&self, question: &str, image_base64: Option<&str>) -> Result<()> {
        let record = QuestionRecord {
            timestamp: Utc::now().to_rfc3339(),
            question: question.trim().to_string(),
            image_base64: image_base64.map(|image| image.trim().to_string()),
        };

        append_jsonl(&self.dir, &self.file_path(), &record)
    }

    #[inline]
    pub fn file_path(&self) -> PathBuf {
        self.dir.join("qa_data.jsonl")
    }
}

/// Append one serialized record as a single line, creating the directory on
/// first use. The line is written with a single `write_all` call so that
/// interleaved appends stay line-atomic.
fn append_jsonl<T: Serialize>(dir: &Path, path: &Path, record: &T) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let mut line = serde_json::to_string(record).context("Failed to serialize log record")?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to append to log file: {}", path.display()))?;

    Ok(())
}
