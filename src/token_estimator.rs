//! Word-approximation token counting.
//!
//! Deliberately not a tokenizer: every strategy needs a cheap, synchronous
//! estimate of how many LLM tokens a chunk will cost, not an exact BPE
//! count. English text averages roughly 1.3 tokens per whitespace-delimited
//! word; CJK/script-heavy text trends closer to 1 token per character, so
//! the estimator branches on the same unicode-block signal the language
//! detector uses.

/// Average tokens-per-word ratio for space-delimited scripts (English and
/// friends), calibrated against common BPE tokenizers.
const WORDS_TO_TOKENS_RATIO: f32 = 1.3;

/// Estimates token counts without invoking a real tokenizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenEstimator;

impl TokenEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Estimate the number of LLM tokens a string would cost.
    pub fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let cjk_chars = text.chars().filter(|c| is_dense_script(*c)).count();
        let total_chars = text.chars().count();

        if total_chars == 0 {
            return 0;
        }

        let cjk_ratio = cjk_chars as f32 / total_chars as f32;
        if cjk_ratio > 0.3 {
            // Dense scripts: roughly one token per character, with a small
            // discount for the remaining whitespace/latin portion.
            let dense_estimate = cjk_chars as f32;
            let sparse_estimate =
                (total_chars - cjk_chars) as f32 / 4.0; // ~4 chars/token for latin remainder
            return (dense_estimate + sparse_estimate).ceil() as usize;
        }

        let word_count = text.split_whitespace().count();
        ((word_count as f32) * WORDS_TO_TOKENS_RATIO).ceil() as usize
    }
}

fn is_dense_script(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0x3040..=0x309F // Hiragana
        | 0x30A0..=0x30FF // Katakana
        | 0xAC00..=0xD7A3 // Hangul syllables
    )
}
