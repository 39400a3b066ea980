//! Text normalization, exact token matching and fuzzy scoring

use attest_domain::{LineRange, SourceDocument};
use std::collections::HashMap;

/// A normalized token and the source line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Normalized token text
    pub text: String,

    /// 1-indexed source line
    pub line: usize,
}

/// Normalize text for comparison
///
/// Lowercases, folds typographic ligatures, turns every non-alphanumeric
/// character into a separator and collapses runs of whitespace. Quotes,
/// dashes and stray OCR punctuation therefore never block a match.
///
/// # Examples
///
/// ```
/// use attest_gatekeeper::normalize;
///
/// assert_eq!(normalize("  “Backups”  run\tdaily — at 2 AM. "), "backups run daily at 2 am");
/// ```
pub fn normalize(text: &str) -> String {
    words(text).join(" ")
}

/// Normalized tokens of `text`
pub fn words(text: &str) -> Vec<String> {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{FB01}' => folded.push_str("fi"),
            '\u{FB02}' => folded.push_str("fl"),
            c if c.is_alphanumeric() => folded.extend(c.to_lowercase()),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().map(str::to_string).collect()
}

/// Normalized tokens of a document range, tagged with their line numbers
pub fn tokens_in(source: &SourceDocument, range: LineRange) -> Vec<Token> {
    source
        .numbered(range)
        .flat_map(|(line, text)| {
            words(text)
                .into_iter()
                .map(move |text| Token { text, line })
        })
        .collect()
}

/// Lines covered by a run of tokens
fn span(tokens: &[Token]) -> Option<LineRange> {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => Some(LineRange::new(first.line, last.line)),
        _ => None,
    }
}

/// Earliest exact occurrence of `needle` as a contiguous token run
pub fn find_exact(needle: &[String], haystack: &[Token]) -> Option<LineRange> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .find(|window| window.iter().zip(needle).all(|(t, n)| &t.text == n))
        .and_then(span)
}

/// Best fuzzy window for a quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch {
    /// Similarity in [0, 1]
    pub score: f64,

    /// Lines covered by the best window
    pub location: LineRange,
}

/// Best similarity between `needle` and any window of `haystack`
///
/// Windows span roughly a quarter more or fewer tokens than the quote. The
/// earliest window wins ties, then the shortest.
///
/// The haystack is flattened to one character array up front. Each start
/// position then grows its window token by token, adding only the new
/// bigrams, so no window is ever materialized as a string.
pub fn best_fuzzy(needle: &[String], haystack: &[Token]) -> Option<FuzzyMatch> {
    if needle.is_empty() || haystack.is_empty() {
        return None;
    }

    let target: Vec<char> = needle.concat().chars().collect();
    let mut ids: HashMap<(char, char), usize> = HashMap::new();
    let mut wanted: Vec<usize> = Vec::new();
    for pair in target.windows(2) {
        let next = ids.len();
        let id = *ids.entry((pair[0], pair[1])).or_insert(next);
        if id == wanted.len() {
            wanted.push(0);
        }
        wanted[id] += 1;
    }
    let target_pairs = target.len().saturating_sub(1);

    // Token i occupies chars[offsets[i]..offsets[i + 1]]
    let mut chars: Vec<char> = Vec::new();
    let mut offsets = Vec::with_capacity(haystack.len() + 1);
    for token in haystack {
        offsets.push(chars.len());
        chars.extend(token.text.chars());
    }
    offsets.push(chars.len());
    let pair_ids: Vec<Option<usize>> = chars
        .windows(2)
        .map(|pair| ids.get(&(pair[0], pair[1])).copied())
        .collect();

    let q = needle.len();
    let min_len = q.saturating_sub(q / 4 + 1).max(1);
    let max_len = q + q / 4 + 1;

    let mut seen = vec![0usize; wanted.len()];
    let mut best: Option<FuzzyMatch> = None;
    for start in 0..haystack.len() {
        seen.fill(0);
        let mut shared = 0usize;
        let mut next_pair = offsets[start];

        for len in min_len..=max_len {
            let end = start + len;
            if end > haystack.len() {
                break;
            }

            // Bigrams of the window are the pairs starting before its last char
            while next_pair + 1 < offsets[end] {
                if let Some(id) = pair_ids[next_pair] {
                    if seen[id] < wanted[id] {
                        shared += 1;
                    }
                    seen[id] += 1;
                }
                next_pair += 1;
            }

            let window_chars = offsets[end] - offsets[start];
            let score = if target.len() < 2 || window_chars < 2 {
                // Strings too short to have bigrams only match themselves
                if chars[offsets[start]..offsets[end]] == target[..] {
                    1.0
                } else {
                    0.0
                }
            } else {
                2.0 * shared as f64 / (target_pairs + window_chars - 1) as f64
            };

            if best.map_or(true, |b| score > b.score) {
                if let Some(location) = span(&haystack[start..end]) {
                    best = Some(FuzzyMatch { score, location });
                }
            }
        }
    }
    best
}

/// Sørensen–Dice similarity of two strings over character bigrams
///
/// Spaces are ignored so OCR spacing noise (`2AM` vs `2 AM`) does not lower
/// the score.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: String = words(a).concat();
    let b: String = words(b).concat();
    Bigrams::new(&a).dice(&Bigrams::new(&b))
}

/// Multiset of character bigrams
struct Bigrams {
    text_len: usize,
    text: String,
    counts: HashMap<(char, char), usize>,
    total: usize,
}

impl Bigrams {
    fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut counts = HashMap::new();
        for pair in chars.windows(2) {
            *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
        }
        let total = chars.len().saturating_sub(1);
        Self {
            text_len: chars.len(),
            text: text.to_string(),
            counts,
            total,
        }
    }

    fn dice(&self, other: &Bigrams) -> f64 {
        // Strings too short to have bigrams only match themselves
        if self.text_len < 2 || other.text_len < 2 {
            return if self.text == other.text && self.text_len > 0 { 1.0 } else { 0.0 };
        }
        let shared: usize = self
            .counts
            .iter()
            .map(|(pair, n)| (*n).min(other.counts.get(pair).copied().unwrap_or(0)))
            .sum();
        2.0 * shared as f64 / (self.total + other.total) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(text: &str) -> SourceDocument {
        SourceDocument::from_text("doc", text)
    }

    #[test]
    fn test_normalize_collapses_noise() {
        assert_eq!(normalize("Access  is\u{00A0}reviewed,quarterly."), "access is reviewed quarterly");
        assert_eq!(normalize("‘Quoted’ “text”"), "quoted text");
        assert_eq!(normalize("con\u{FB01}guration"), "configuration");
        assert_eq!(normalize("...!"), "");
    }

    #[test]
    fn test_tokens_carry_line_numbers() {
        let d = doc("alpha beta\n\ngamma");
        let tokens = tokens_in(&d, LineRange::new(1, 3));
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 3]);
    }

    #[test]
    fn test_exact_match_spans_lines() {
        let d = doc("intro\nBackups run\ndaily at 2 AM.\noutro");
        let hay = tokens_in(&d, LineRange::new(1, 4));
        let found = find_exact(&words("backups run daily"), &hay);
        assert_eq!(found, Some(LineRange::new(2, 3)));
    }

    #[test]
    fn test_exact_match_requires_whole_tokens() {
        let d = doc("Backups running daily");
        let hay = tokens_in(&d, LineRange::new(1, 1));
        assert_eq!(find_exact(&words("backups run"), &hay), None);
    }

    #[test]
    fn test_similarity_ignores_spacing() {
        assert_eq!(similarity("at 2AM", "at 2 AM"), 1.0);
        assert_eq!(similarity("", "anything"), 0.0);
        assert_eq!(similarity("a", "a"), 1.0);
    }

    #[test]
    fn test_paraphrase_lands_in_recovery_band() {
        let d = doc("Backups run daily at 2 AM.");
        let hay = tokens_in(&d, LineRange::new(1, 1));
        let found = best_fuzzy(&words("Backup runs daily around 2AM"), &hay).unwrap();

        assert!(found.score >= 0.40 && found.score < 0.80, "score {}", found.score);
        assert_eq!(found.location, LineRange::single(1));
    }

    #[test]
    fn test_unrelated_text_scores_low() {
        let d = doc("Backups run daily at 2 AM.\nThe server room is locked.");
        let hay = tokens_in(&d, LineRange::new(1, 2));
        let found = best_fuzzy(&words("Passwords rotate every 90 days"), &hay).unwrap();
        assert!(found.score < 0.40, "score {}", found.score);
    }

    /// Scores every window from scratch
    fn best_by_rescoring(needle: &[String], haystack: &[Token]) -> Option<FuzzyMatch> {
        let target = Bigrams::new(&needle.concat());
        let q = needle.len();
        let min_len = q.saturating_sub(q / 4 + 1).max(1);
        let mut best: Option<FuzzyMatch> = None;
        for start in 0..haystack.len() {
            for len in min_len..=q + q / 4 + 1 {
                let Some(window) = haystack.get(start..start + len) else { break };
                let joined: String = window.iter().map(|t| t.text.as_str()).collect();
                let score = target.dice(&Bigrams::new(&joined));
                if best.map_or(true, |b| score > b.score) {
                    best = span(window).map(|location| FuzzyMatch { score, location });
                }
            }
        }
        best
    }

    #[test]
    fn test_single_char_quote() {
        let d = doc("x y
a b");
        let hay = tokens_in(&d, LineRange::new(1, 2));
        let found = best_fuzzy(&words("a"), &hay).unwrap();
        assert_eq!(found.score, 1.0);
        assert_eq!(found.location, LineRange::single(2));
    }

    #[test]
    fn test_near_miss_at_end_of_long_chunk() {
        let mut text: Vec<String> = (1..=999)
            .map(|n| format!("Control {} is reviewed by the operations team every quarter.", n))
            .collect();
        text.push("Backups run daily at 2 AM and are retained for 35 days.".to_string());
        let d = doc(&text.join("\n"));
        let hay = tokens_in(&d, LineRange::new(1, 1000));
        let needle = words("Backup runs daily around 2AM, kept for 35 days");

        let started = std::time::Instant::now();
        let found = best_fuzzy(&needle, &hay).unwrap();
        let elapsed = started.elapsed();

        assert_eq!(found.location, LineRange::single(1000));
        assert!(found.score >= 0.40, "score {}", found.score);
        assert!(elapsed < std::time::Duration::from_millis(500), "took {:?}", elapsed);
    }

    proptest! {
        #[test]
        fn prop_sliding_matches_rescoring(
            lines in proptest::collection::vec("[a-c ]{0,12}", 1..8),
            quote in "[a-c]{1,3}( [a-c]{1,3}){0,4}",
        ) {
            let d = doc(&lines.join("\n"));
            let hay = tokens_in(&d, LineRange::new(1, lines.len()));
            let needle = words(&quote);
            let fast = best_fuzzy(&needle, &hay);
            let slow = best_by_rescoring(&needle, &hay);
            prop_assert_eq!(fast.map(|m| m.location), slow.map(|m| m.location));
            match (fast, slow) {
                (Some(a), Some(b)) => prop_assert!((a.score - b.score).abs() < 1e-12),
                (a, b) => prop_assert!(a.is_none() && b.is_none()),
            }
        }
    }

    #[test]
    fn test_fuzzy_prefers_earliest_on_tie() {
        let d = doc("firewall rules reviewed\nfirewall rules reviewed");
        let hay = tokens_in(&d, LineRange::new(1, 2));
        let found = best_fuzzy(&words("firewall rules reviewed"), &hay).unwrap();
        assert_eq!(found.score, 1.0);
        assert_eq!(found.location, LineRange::single(1));
    }
}
