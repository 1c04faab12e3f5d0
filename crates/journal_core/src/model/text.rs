//! Normalization of user-entered names and tags.
//!
//! # Invariants
//! - Names are trimmed and inner whitespace runs collapse to one space.
//! - Tags are normalized like names and lowercased.
//! - Tag lists keep first-occurrence order and contain no duplicates.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Normalizes a display name.
pub fn normalize_name(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Normalizes one tag value. Blank input yields an empty string.
pub fn normalize_tag(value: &str) -> String {
    normalize_name(value).to_lowercase()
}

/// Normalizes and deduplicates tag values, preserving first occurrence order.
///
/// Blank tags are kept (once) so validation can report them.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let value = normalize_tag(tag);
        if !normalized.contains(&value) {
            normalized.push(value);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::{normalize_name, normalize_tag, normalize_tags};

    #[test]
    fn name_collapses_whitespace() {
        assert_eq!(normalize_name("  Shadows \t of\n Esteren "), "Shadows of Esteren");
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated_in_order() {
        let tags = vec![
            "Session Zero".to_string(),
            "NPC".to_string(),
            "session   zero".to_string(),
            "npc ".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["session zero", "npc"]);
    }

    #[test]
    fn blank_tag_normalizes_to_empty() {
        assert_eq!(normalize_tag("   "), "");
    }
}
