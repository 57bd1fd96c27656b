// OCR extraction for uploaded images. The heavy lifting is delegated to the
// `tesseract` CLI; this module only decodes the payload, shells out, and
// scrubs the result down to something worth feeding into a prompt.


use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use fancy_regex::Regex;
use std::fs;
use std::process::Command;
use std::sync::LazyLock;
use tracing::debug;

/// OCR output shorter than this many words is treated as noise.
const MIN_OCR_WORDS: usize = 5;

static JUNK_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s.,:;?!%-]").expect("valid junk-chars pattern"));
static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Run OCR over a base64-encoded image and return the raw extracted text.
///
/// The payload is written to a temporary file and handed to
/// `tesseract <file> stdout`; the file is removed afterwards. Any failure
/// (malformed base64, missing binary, non-zero exit) surfaces as an error
/// for the caller to degrade on.
#[inline]
pub fn extract_text_from_base64(image_base64: &str) -> Result<String> {
    let bytes = BASE64
        .decode(image_base64.trim())
        .context("Invalid base64 image payload")?;
    if bytes.is_empty() {
        bail!("Empty image payload");
    }

    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let image_path = std::env::temp_dir().join(format!(
        "course_ta_ocr_{}_{}.png",
        std::process::id(),
        stamp
    ));
    fs::write(&image_path, &bytes)
        .with_context(|| format!("Failed to write OCR scratch file: {}", image_path.display()))?;

    let output = Command::new("tesseract")
        .arg(&image_path)
        .arg("stdout")
        .output()
        .with_context(|| format!("Failed to execute tesseract for {}", image_path.display()));

    let _ = fs::remove_file(&image_path);
    let output = output?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "tesseract returned non-zero exit status: {}",
            stderr.trim()
        );
    }

    let text = String::from_utf8_lossy(&output.stdout)
        .replace('\u{0000}', "")
        .trim()
        .to_string();
    debug!("OCR extracted {} bytes of text", text.len());
    Ok(text)
}

/// Strip junk symbols and collapse whitespace; returns `None` when the
/// result is too short to be real content.
#[inline]
pub fn scrub(text: &str) -> Option<String> {
    let cleaned = JUNK_CHARS.replace_all(text, "");
    let cleaned = WHITESPACE_RUNS.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if cleaned.split_whitespace().count() < MIN_OCR_WORDS {
        None
    } else {
        Some(cleaned.to_string())
    }
}
