//! Scores how much a chunk depends on text that precedes it.

use once_cell::sync::Lazy;
use regex::Regex;

static PRONOUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(it|this|that|these|those|they|them|he|she|him|her)\b").unwrap()
});
static BACK_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(above|previous|aforementioned|earlier|preceding)\b").unwrap());
static FORWARD_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(below|following|next|subsequent)\b").unwrap());
static CONJUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(however|therefore|moreover|furthermore|thus|additionally|consequently)\b").unwrap());

/// Produces a `0..1` context-dependency score from pronoun/back-reference/
/// forward-reference/conjunction density, normalised by sentence count.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextDependencyAnalyzer;

impl ContextDependencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, text: &str) -> f32 {
        let sentences = crate::overlap::split_sentences(text);
        let sentence_count = sentences.len().max(1);

        let pronouns = PRONOUN_RE.find_iter(text).count();
        let back_refs = BACK_REF_RE.find_iter(text).count();
        let forward_refs = FORWARD_REF_RE.find_iter(text).count();
        let conjunctions = sentences
            .iter()
            .filter(|s| CONJUNCTION_RE.is_match(s.trim_start()))
            .count();

        // Back-references and leading conjunctions are the strongest
        // dependency signal; pronouns and forward references contribute
        // less per occurrence.
        let raw = (pronouns as f32 * 0.15)
            + (back_refs as f32 * 0.5)
            + (forward_refs as f32 * 0.3)
            + (conjunctions as f32 * 0.4);

        (raw / sentence_count as f32).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_text_has_low_dependency() {
        let analyzer = ContextDependencyAnalyzer::new();
        let score = analyzer.score("The Eiffel Tower is located in Paris. It was completed in 1889.");
        assert!(score < 0.5);
    }

    #[test]
    fn back_reference_raises_dependency() {
        let analyzer = ContextDependencyAnalyzer::new();
        let score = analyzer.score("As mentioned above, the previous section covers this in detail.");
        assert!(score > 0.3);
    }

    #[test]
    fn leading_conjunction_raises_dependency() {
        let analyzer = ContextDependencyAnalyzer::new();
        let score = analyzer.score("Therefore, the conclusion follows directly.");
        assert!(score > 0.0);
    }

    #[test]
    fn empty_text_scores_zero() {
        let analyzer = ContextDependencyAnalyzer::new();
        assert_eq!(analyzer.score(""), 0.0);
    }
}
