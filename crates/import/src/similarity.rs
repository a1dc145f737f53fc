//! Counterparty-name similarity between a statement description and an
//! installment's counterparty.
//!
//! Every check runs on [`normalize_text`] output, so case, accents and
//! punctuation never affect the result.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Name tokens shorter than this are ignored by the overlap fallback.
const MIN_NAME_TOKEN_CHARS: usize = 3;
/// Description tokens shorter than this are ignored by the overlap fallback.
const MIN_DESCRIPTION_TOKEN_CHARS: usize = 4;

/// Lowercases, strips diacritics, and reduces the text to single-space
/// separated alphanumeric words.
pub fn normalize_text(s: &str) -> String {
    let folded: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Both sides have something left to compare after normalization.
pub fn is_name_available(description: &str, counterparty: Option<&str>) -> bool {
    counterparty.is_some_and(|name| !normalize_text(name).is_empty())
        && !normalize_text(description).is_empty()
}

/// Similarity in `[0.0, 1.0]`: `1.0` for a containment hit, otherwise the
/// best token-overlap fraction.
pub fn name_score(description: &str, counterparty: Option<&str>) -> f64 {
    let Some(name) = counterparty.map(normalize_text).filter(|n| !n.is_empty()) else {
        return 0.0;
    };
    let description = normalize_text(description);
    if description.is_empty() {
        return 0.0;
    }

    if contains_name(&description, &name) {
        return 1.0;
    }
    token_overlap(&description, &name)
}

fn contains_name(description: &str, name: &str) -> bool {
    let compact_name: String = name.chars().filter(|c| *c != ' ').collect();
    let compact_description: String = description.chars().filter(|c| *c != ' ').collect();
    let first_token = description.split(' ').next().unwrap_or_default();

    description.contains(name)
        || description.contains(&compact_name)
        || name.contains(description)
        || compact_name.contains(&compact_description)
        || first_token.contains(&compact_name)
}

fn token_overlap(description: &str, name: &str) -> f64 {
    let name_in_description = fraction_found(name, MIN_NAME_TOKEN_CHARS, description);
    let description_in_name = fraction_found(description, MIN_DESCRIPTION_TOKEN_CHARS, name);
    name_in_description.max(description_in_name)
}

/// Share of `source`'s tokens (at least `min_chars` long) that occur in `target`.
fn fraction_found(source: &str, min_chars: usize, target: &str) -> f64 {
    let tokens: Vec<&str> = source
        .split(' ')
        .filter(|t| t.chars().count() >= min_chars)
        .collect();
    if tokens.is_empty() {
        return 0.0;
    }
    let found = tokens.iter().filter(|t| target.contains(**t)).count();
    found as f64 / tokens.len() as f64
}
