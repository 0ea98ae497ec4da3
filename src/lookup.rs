//! Title folding and "did you mean" suggestions for missed lookups.
//!
//! Lookup by title is always exact; these helpers only run after a miss to
//! offer the closest catalog titles.

use any_ascii::any_ascii;
use rustc_hash::FxHashSet;
use strsim::jaro_winkler;
use unicode_normalization::UnicodeNormalization;

/// Suggestions below this similarity are dropped
pub const MIN_SUGGESTION_SIMILARITY: f64 = 0.75;

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Comparison key for a title: folded, curly quotes straightened, whitespace collapsed.
pub fn title_key(title: &str) -> String {
    let straightened = title
        .replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");
    fold_to_ascii(&straightened)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Closest titles to `query`, best first, ties in input order.
/// Duplicate titles are reported once.
pub fn suggest_titles<'a, I>(titles: I, query: &str, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if limit == 0 {
        return Vec::new();
    }

    let query_key = title_key(query);
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut scored: Vec<(f64, &str)> = Vec::new();

    for title in titles {
        if !seen.insert(title) {
            continue;
        }
        let similarity = jaro_winkler(&query_key, &title_key(title));
        if similarity >= MIN_SUGGESTION_SIMILARITY {
            scored.push((similarity, title));
        }
    }

    // Stable sort keeps input order for equal scores
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, title)| title.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Motörhead"), "motorhead");
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
    }

    #[test]
    fn test_title_key() {
        assert_eq!(
            title_key("Knockin\u{2019}  On Heaven's   Door"),
            "knockin' on heaven's door"
        );
        assert_eq!(title_key("Café Del Mar"), "cafe del mar");
    }

    #[test]
    fn test_suggest_titles_ranks_closest_first() {
        let titles = ["Shivers", "Anti-Hero", "As It Was", "Unholy"];
        let suggestions = suggest_titles(titles.iter().copied(), "anti hero", 2);
        assert_eq!(suggestions.first().map(String::as_str), Some("Anti-Hero"));
    }

    #[test]
    fn test_suggest_titles_matches_through_diacritics() {
        let titles = ["Tití Me Preguntó", "Ojitos Lindos"];
        let suggestions = suggest_titles(titles.iter().copied(), "Titi Me Pregunto", 3);
        assert_eq!(suggestions, vec!["Tití Me Preguntó".to_string()]);
    }

    #[test]
    fn test_suggest_titles_dedups_and_filters() {
        let titles = ["Unholy", "Unholy", "Bad Habit"];
        let suggestions = suggest_titles(titles.iter().copied(), "unholy", 5);
        assert_eq!(suggestions, vec!["Unholy".to_string()]);
        assert!(suggest_titles(titles.iter().copied(), "zzzzzzzz", 5).is_empty());
        assert!(suggest_titles(titles.iter().copied(), "unholy", 0).is_empty());
    }
}
