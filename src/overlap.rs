//! Adaptive overlap sizing and construction: overlap size is computed per
//! boundary from sentence layout and semantic continuity, never a fixed
//! constant.

use std::collections::HashSet;

use crate::data::ChunkingOptions;

const IMPORTANT_KEYWORDS: &[&str] = &[
    "important", "critical", "note", "warning", "required", "must", "shall",
];

/// Splits text into sentences on `.`, `!`, `?`, and the ideographic full
/// stop `。`, keeping the terminator attached to the sentence it ends.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let ch = text[i..].chars().next().unwrap();
        let ch_len = ch.len_utf8();
        if matches!(ch, '.' | '!' | '?' | '。') {
            let end = i + ch_len;
            let candidate = text[start..end].trim();
            if !candidate.is_empty() {
                sentences.push(candidate);
            }
            start = end;
        }
        i += ch_len;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Computes and builds adaptive, sentence-aligned overlap text between
/// consecutive chunks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdaptiveOverlapManager;

impl AdaptiveOverlapManager {
    pub fn new() -> Self {
        Self
    }

    /// `optimal_overlap` per `spec.md` §4.6: bounded by
    /// `min(3*overlap_size, max_chunk_size/4)`, built from a sentence-aligned
    /// base plus semantic-continuity and important-content bonuses.
    pub fn optimal_overlap(&self, prev: &str, next: &str, options: &ChunkingOptions) -> usize {
        let max_overlap = std::cmp::min(
            3 * options.overlap_size,
            options.max_chunk_size / 4,
        );
        if max_overlap == 0 || options.overlap_size == 0 {
            return 0;
        }

        let base = options.overlap_size as f32;
        let jaccard = shared_keyword_jaccard(prev, next);
        let continuity_bonus = base * 0.5 * jaccard;
        let important_bonus = if contains_important_keyword(prev) { base * 0.3 } else { 0.0 };

        let total = base + continuity_bonus + important_bonus;
        (total.round() as usize).min(max_overlap)
    }

    /// Build overlap text by taking whole trailing sentences from `prev`
    /// until the target size is reached (never splitting mid-sentence).
    pub fn build_overlap_text(&self, prev: &str, target_size: usize) -> String {
        if target_size == 0 {
            return String::new();
        }
        let sentences = split_sentences(prev);
        let mut collected: Vec<&str> = Vec::new();
        let mut total_len = 0usize;
        for sentence in sentences.iter().rev() {
            let candidate_len = total_len + sentence.len() + 1;
            collected.push(sentence);
            total_len = candidate_len;
            if total_len >= target_size {
                break;
            }
        }
        collected.reverse();
        collected.join(" ")
    }

    /// Observational-only validator (never called from a hot strategy
    /// path, per `SPEC_FULL.md` §12 item 2): scores how well a proposed
    /// overlap text actually bridges `prev` and `next`.
    pub fn validate(&self, overlap: &str, prev: &str, next: &str) -> f32 {
        let end_match = similarity(overlap, &suffix(prev, overlap.len()));
        let start_match = similarity(overlap, &prefix(next, overlap.len()));
        let sentence_completeness = if ends_on_sentence(overlap) { 1.0 } else { 0.0 };
        0.4 * end_match + 0.4 * start_match + 0.2 * sentence_completeness
    }
}

/// Trims `text` to at most `budget` bytes, keeping the trailing portion
/// (the part nearest to whatever it's about to be stitched against) and
/// landing on a char boundary so the cut never splits a UTF-8 sequence.
pub fn fit_to_budget(text: &str, budget: usize) -> &str {
    if text.len() <= budget {
        return text;
    }
    let mut start = text.len() - budget;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

fn ends_on_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '!', '?', '。'])
}

fn suffix(text: &str, approx_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(approx_len);
    chars[start..].iter().collect()
}

fn prefix(text: &str, approx_len: usize) -> String {
    text.chars().take(approx_len).collect()
}

/// Normalised Levenshtein similarity in `[0, 1]`; `1.0` for equal strings.
fn similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let dist = levenshtein(a, b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        1.0
    } else {
        1.0 - (dist as f32 / max_len as f32)
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut cur = vec![0usize; m + 1];

    for i in 1..=n {
        cur[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            cur[j] = std::cmp::min(
                std::cmp::min(cur[j - 1] + 1, prev[j] + 1),
                prev[j - 1] + cost,
            );
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[m]
}

fn keyword_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.len() > 3)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn shared_keyword_jaccard(a: &str, b: &str) -> f32 {
    let sa = keyword_set(a);
    let sb = keyword_set(b);
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn contains_important_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    IMPORTANT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
