//! Tag normalization for note metadata.
//!
//! Tags arrive from the host index in whatever shape the user typed them:
//! `#Philosophy`, `ethics `, `#ETHICS`. Every tag set is normalized before
//! it enters a `Note`, so all downstream comparisons are plain string
//! equality. Normalization is idempotent.

use crate::defaults::TAG_NAME_MAX_LENGTH;

/// Normalize a single tag: trim whitespace, strip a leading `#`, lowercase.
///
/// Returns `None` for tags that are empty after normalization or exceed
/// [`TAG_NAME_MAX_LENGTH`].
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').trim().to_lowercase();
    if tag.is_empty() || tag.chars().count() > TAG_NAME_MAX_LENGTH {
        return None;
    }
    Some(tag)
}

/// Normalize a tag list: normalize each entry, drop empties, deduplicate
/// while preserving first-occurrence order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in raw {
        if let Some(normalized) = normalize_tag(tag.as_ref()) {
            if seen.insert(normalized.clone()) {
                out.push(normalized);
            }
        }
    }
    out
}

/// Count tags present in both normalized sets, preserving `a`'s order.
pub fn matched_tags(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().filter(|t| b.contains(t)).cloned().collect()
}
