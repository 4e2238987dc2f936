//! Note content preparation and hashing.
//!
//! Before embedding, markdown scaffolding is stripped so the vector
//! reflects prose, not syntax, and the result is hard-truncated at a fixed
//! character budget to stay inside provider token limits without
//! per-provider tokenization.
//!
//! The content hash is computed over the **raw** content, before any
//! preparation: staleness must track what the user edited, not what the
//! embedder saw.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use notemesh_core::defaults::{EMBED_CONTENT_MAX_CHARS, TRUNCATION_MARKER};

/// SHA-256 hash of raw note content, hex-encoded.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

static FRONTMATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\r?\n.*?\r?\n---\r?\n?").unwrap());
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```[^\n]*$").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());
static WIKI_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[(?:[^\]|]*\|)?([^\]]+)\]\]").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s?").unwrap());
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").unwrap());
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\*{1,3}|_{1,3}|`)").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Strip markdown structure and truncate to the embedding budget.
pub fn prepare_for_embedding(content: &str) -> String {
    prepare_with_budget(content, EMBED_CONTENT_MAX_CHARS)
}

/// Strip markdown structure and truncate to an explicit character budget.
pub fn prepare_with_budget(content: &str, max_chars: usize) -> String {
    let text = FRONTMATTER.replace(content, "");
    let text = CODE_FENCE.replace_all(&text, "");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = WIKI_LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    let text = text.trim();

    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}{}", truncated, TRUNCATION_MARKER)
}
