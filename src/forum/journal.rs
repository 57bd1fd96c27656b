// Append-only key-value journal for resumable forum scraping: one JSONL
// line per saved post, keyed by post id. A run reloads the journal first
// and skips every id already present.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::SavedPost;

#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    entries: BTreeMap<u64, SavedPost>,
    pending: Vec<u64>,
}

impl Journal {
    /// Load the journal from disk; a missing file yields an empty journal.
    /// When an id occurs more than once, the last line wins.
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = BTreeMap::new();

        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read journal: {}", path.display()))?;

            for (i, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let post: SavedPost = serde_json::from_str(line).with_context(|| {
                    format!("Malformed journal line {} in {}", i + 1, path.display())
                })?;
                entries.insert(post.post_id, post);
            }

            info!(
                "Loaded {} journal entries from {}",
                entries.len(),
                path.display()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            pending: Vec::new(),
        })
    }

    #[inline]
    pub fn contains(&self, post_id: u64) -> bool {
        self.entries.contains_key(&post_id)
    }

    /// Record a post in memory; it reaches disk at the next `flush`.
    #[inline]
    pub fn insert(&mut self, post: SavedPost) {
        self.pending.push(post.post_id);
        self.entries.insert(post.post_id, post);
    }

    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append all pending entries to the journal file.
    #[inline]
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create journal directory: {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let pending = std::mem::take(&mut self.pending);
        let flushed = pending.len();
        for post_id in pending {
            if let Some(post) = self.entries.get(&post_id) {
                let mut line =
                    serde_json::to_string(post).context("Failed to serialize journal entry")?;
                line.push('\n');
                file.write_all(line.as_bytes()).with_context(|| {
                    format!("Failed to append to journal: {}", self.path.display())
                })?;
            }
        }

        debug!("Flushed {} journal entries", flushed);
        Ok(())
    }

    #[inline]
    pub fn posts(&self) -> impl Iterator<Item = &SavedPost> {
        self.entries.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
