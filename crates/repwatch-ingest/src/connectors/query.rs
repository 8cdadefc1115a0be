//! Subject query construction and relevance matching.
//!
//! Connectors own query expansion: name-based subjects search under several
//! variants (quoted, bare, de-hyphenated, suffix-stripped) and the first
//! variant returning results wins. Relevance filtering keeps only items
//! that actually mention the subject.

use std::collections::HashSet;

/// Trailing tokens commonly dropped when people write a brand name.
const COMMON_SUFFIXES: &[&str] = &["inc", "llc", "ltd", "co", "company"];

/// Builds the ordered query-variant strategy list for a subject.
///
/// Variants, most to least precise:
/// 1. the exact value, quoted
/// 2. the bare value
/// 3. hyphens replaced by spaces (multi-word terms written either way)
/// 4. the value with a trailing corporate suffix stripped
///
/// Duplicates are collapsed case-insensitively while preserving order.
pub(crate) fn build_query_variants(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    let mut variants = vec![format!("\"{trimmed}\""), trimmed.to_string()];

    if trimmed.contains('-') {
        variants.push(trimmed.replace('-', " "));
    }

    if let Some(stripped) = strip_common_suffix(trimmed) {
        variants.push(format!("\"{stripped}\""));
        variants.push(stripped);
    }

    let mut seen = HashSet::new();
    variants.retain(|q| seen.insert(q.to_lowercase()));
    variants
}

/// Normalized match terms for relevance filtering.
pub(crate) fn build_subject_terms(value: &str) -> Vec<String> {
    let mut terms = vec![
        normalize_for_match(value),
        normalize_for_match(&value.replace('\'', "")),
        normalize_for_match(&value.replace('-', " ")),
    ];
    if let Some(stripped) = strip_common_suffix(value) {
        terms.push(normalize_for_match(&stripped));
    }
    terms.retain(|t| !t.is_empty());
    terms.sort();
    terms.dedup();
    terms
}

/// Whether `text` actually mentions the subject.
///
/// Matches whole normalized phrases, plus a compact (space-free) form for
/// handles written as one word; very short terms are ignored to avoid
/// matching on noise.
pub(crate) fn mentions_subject(text: &str, terms: &[String]) -> bool {
    let normalized = normalize_for_match(text);
    let padded = format!(" {normalized} ");
    let compact = normalized.replace(' ', "");
    terms.iter().any(|term| {
        if term.len() < 3 {
            return false;
        }
        let needle = format!(" {term} ");
        if padded.contains(&needle) {
            return true;
        }
        let compact_term = term.replace(' ', "");
        compact_term.len() >= 6 && compact.contains(&compact_term)
    })
}

fn strip_common_suffix(value: &str) -> Option<String> {
    // ASCII lowering keeps byte offsets aligned with `value`.
    let lower = value.to_ascii_lowercase();
    for suffix in COMMON_SUFFIXES {
        let with_space = format!(" {suffix}");
        if lower.ends_with(&with_space) {
            let cut = value.len() - with_space.len();
            let stripped = value[..cut].trim_end_matches([',', '.']).trim();
            if !stripped.is_empty() {
                return Some(stripped.to_string());
            }
        }
    }
    None
}

fn normalize_for_match(input: &str) -> String {
    input
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
