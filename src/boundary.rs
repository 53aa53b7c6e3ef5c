//! Rates how "natural" a proposed cut point between two lines is, and can
//! search nearby for a better one.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").unwrap());
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([-*+]|\d+[.)])\s+\S").unwrap());
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```").unwrap());
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|.*\|").unwrap());

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。'];

/// The kind of boundary a line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Structural,
    Semantic,
    Paragraph,
    Sentence,
    Arbitrary,
    Poor,
}

/// Result of evaluating a single candidate cut point.
#[derive(Debug, Clone)]
pub struct BoundaryQuality {
    pub quality: f32,
    pub kind: BoundaryKind,
    pub confidence: f32,
    pub reason: String,
}

/// Rates proposed cut points and can search a neighbourhood for a better
/// one.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundaryQualityEvaluator;

impl BoundaryQualityEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate cutting right before `lines[proposed_line_index]`.
    pub fn evaluate(&self, lines: &[&str], proposed_line_index: usize) -> BoundaryQuality {
        let idx = proposed_line_index.min(lines.len());
        let prev = idx.checked_sub(1).and_then(|i| lines.get(i)).copied();
        let next = lines.get(idx).copied();

        if let Some(score) = self.structural_score(prev, next) {
            return score;
        }
        if let Some(blank_line) = next.filter(|l| l.trim().is_empty()).or(prev.filter(|l| l.trim().is_empty())) {
            let _ = blank_line;
            if let Some(score) = self.semantic_or_paragraph_score(lines, idx) {
                return score;
            }
        }
        if let Some(p) = prev {
            let trimmed = p.trim_end();
            if trimmed.ends_with(SENTENCE_TERMINATORS) {
                return BoundaryQuality {
                    quality: 0.65,
                    kind: BoundaryKind::Sentence,
                    confidence: 0.7,
                    reason: "previous line ends on a sentence terminator".to_string(),
                };
            }
        }

        BoundaryQuality {
            quality: 0.3,
            kind: BoundaryKind::Arbitrary,
            confidence: 0.4,
            reason: "no structural, semantic, paragraph, or sentence signal".to_string(),
        }
    }

    fn structural_score(&self, prev: Option<&str>, next: Option<&str>) -> Option<BoundaryQuality> {
        if next.map(|l| HEADER_RE.is_match(l)).unwrap_or(false) {
            return Some(BoundaryQuality {
                quality: 0.95,
                kind: BoundaryKind::Structural,
                confidence: 0.95,
                reason: "section header begins at this boundary".to_string(),
            });
        }
        let prev_table = prev.map(|l| TABLE_ROW_RE.is_match(l)).unwrap_or(false);
        let next_table = next.map(|l| TABLE_ROW_RE.is_match(l)).unwrap_or(false);
        if prev_table != next_table {
            return Some(BoundaryQuality {
                quality: 0.95,
                kind: BoundaryKind::Structural,
                confidence: 0.9,
                reason: "table begins or ends at this boundary".to_string(),
            });
        }
        let prev_fence = prev.map(|l| CODE_FENCE_RE.is_match(l)).unwrap_or(false);
        let next_fence = next.map(|l| CODE_FENCE_RE.is_match(l)).unwrap_or(false);
        if prev_fence || next_fence {
            return Some(BoundaryQuality {
                quality: 0.95,
                kind: BoundaryKind::Structural,
                confidence: 0.9,
                reason: "code-fence transition at this boundary".to_string(),
            });
        }
        let prev_list = prev.map(|l| LIST_ITEM_RE.is_match(l)).unwrap_or(false);
        let next_list = next.map(|l| LIST_ITEM_RE.is_match(l)).unwrap_or(false);
        if prev_list != next_list {
            return Some(BoundaryQuality {
                quality: 0.95,
                kind: BoundaryKind::Structural,
                confidence: 0.85,
                reason: "list group boundary".to_string(),
            });
        }
        None
    }

    fn semantic_or_paragraph_score(&self, lines: &[&str], idx: usize) -> Option<BoundaryQuality> {
        let blank_idx = if lines.get(idx).map(|l| l.trim().is_empty()).unwrap_or(false) {
            Some(idx)
        } else if idx > 0 && lines.get(idx - 1).map(|l| l.trim().is_empty()).unwrap_or(false) {
            Some(idx - 1)
        } else {
            None
        }?;

        let before = (0..blank_idx).rev().map(|i| lines[i]).find(|l| !l.trim().is_empty());
        let after = (blank_idx + 1..lines.len()).map(|i| lines[i]).find(|l| !l.trim().is_empty());

        if let (Some(b), Some(a)) = (before, after) {
            let overlap = keyword_jaccard(b, a);
            if overlap < 0.3 {
                return Some(BoundaryQuality {
                    quality: 0.85,
                    kind: BoundaryKind::Semantic,
                    confidence: 0.8,
                    reason: format!("blank line with low keyword overlap ({:.2})", overlap),
                });
            }
        }

        Some(BoundaryQuality {
            quality: 0.75,
            kind: BoundaryKind::Paragraph,
            confidence: 0.75,
            reason: "blank line paragraph break".to_string(),
        })
    }

    /// Search `±min(10, N/10)` lines around `proposed_line_index` for a
    /// higher-scoring boundary. Returns the best-scoring index found,
    /// falling back to `proposed_line_index` unchanged if nothing beats the
    /// 0.7 threshold.
    pub fn improve(&self, lines: &[&str], proposed_line_index: usize) -> (usize, BoundaryQuality) {
        let original = self.evaluate(lines, proposed_line_index);
        if original.quality >= 0.7 {
            return (proposed_line_index, original);
        }

        let window = std::cmp::min(10, lines.len() / 10).max(1);
        let lo = proposed_line_index.saturating_sub(window);
        let hi = std::cmp::min(lines.len(), proposed_line_index + window + 1);

        let mut best_idx = proposed_line_index;
        let mut best = original.clone();
        for idx in lo..hi {
            if idx == proposed_line_index {
                continue;
            }
            let candidate = self.evaluate(lines, idx);
            if candidate.quality > best.quality {
                best = candidate;
                best_idx = idx;
            }
        }
        (best_idx, best)
    }
}

fn keyword_jaccard(a: &str, b: &str) -> f32 {
    use std::collections::HashSet;
    let wa: HashSet<String> = a
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
        .collect();
    let wb: HashSet<String> = b
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
        .collect();
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let intersection = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_boundary_is_structural() {
        let lines = ["Some text.", "# New Section", "More text."];
        let eval = BoundaryQualityEvaluator::new();
        let result = eval.evaluate(&lines, 1);
        assert_eq!(result.kind, BoundaryKind::Structural);
        assert!(result.quality >= 0.95);
    }

    #[test]
    fn sentence_terminator_scores_sentence() {
        let lines = ["This ends cleanly.", "A new unrelated line"];
        let eval = BoundaryQualityEvaluator::new();
        let result = eval.evaluate(&lines, 1);
        assert_eq!(result.kind, BoundaryKind::Sentence);
    }

    #[test]
    fn mid_sentence_boundary_is_arbitrary_or_worse() {
        let lines = ["This is a sentence that continues", "onto the next line without punctuation"];
        let eval = BoundaryQualityEvaluator::new();
        let result = eval.evaluate(&lines, 1);
        assert!(result.quality <= 0.5);
    }

    #[test]
    fn improve_finds_nearby_sentence_terminator() {
        let lines = [
            "Paragraph continues",
            "across this line without punctuation",
            "and this one too, still going",
            "until it finally ends here.",
            "Then a brand new paragraph begins",
        ];
        let eval = BoundaryQualityEvaluator::new();
        let (idx, quality) = eval.improve(&lines, 1);
        assert!(quality.quality >= 0.65);
        assert!(idx != 1 || quality.quality >= 0.65);
    }
}
