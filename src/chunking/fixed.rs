//! Baseline splitter: take `max_chunk_size` characters at a time, backing
//! off to the last word boundary when one exists past the half-way point.

use async_trait::async_trait;

use crate::chunking::helper::ChunkingHelper;
use crate::chunking::ChunkingStrategy;
use crate::data::{Chunk, ChunkingOptions, ParsedContent};
use crate::error::PipelineResult;

#[derive(Debug, Default, Clone)]
pub struct FixedSizeStrategy {
    helper: ChunkingHelper,
}

impl FixedSizeStrategy {
    pub fn new() -> Self {
        Self {
            helper: ChunkingHelper::new(),
        }
    }
}

#[async_trait]
impl ChunkingStrategy for FixedSizeStrategy {
    fn name(&self) -> &'static str {
        "FixedSize"
    }

    async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        let text = &parsed.text;
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let max_size = options.max_chunk_size.max(1);
        let overlap = std::cmp::min(options.overlap_size, max_size / 2);

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < total {
            let mut end = std::cmp::min(start + max_size, total);

            // Back off to the last word boundary if one exists past the
            // half-way point of this window and we're not already at the
            // end of the document.
            if end < total {
                let half = start + max_size / 2;
                if let Some(boundary) = find_last_boundary(&chars, start, end, half) {
                    end = boundary;
                }
            }
            if end <= start {
                end = std::cmp::min(start + 1, total);
            }

            let content: String = chars[start..end].iter().collect();
            let chunk = self
                .helper
                .build_chunk(parsed, index, content, self.name(), start, end);
            if !chunk.content.is_empty() {
                chunks.push(chunk);
                index += 1;
            }

            if end >= total {
                break;
            }
            // Advance by at least one character so short back-off windows
            // can never stall the loop, while still honouring overlap.
            let next_start = end.saturating_sub(overlap);
            start = std::cmp::max(next_start, start + 1);
        }

        ChunkingHelper::finalize_indices(&mut chunks);
        Ok(chunks)
    }
}

/// Find the offset of the last whitespace run ending at or before `end`,
/// provided it lies at or after `min_offset`.
fn find_last_boundary(chars: &[char], _start: usize, end: usize, min_offset: usize) -> Option<usize> {
    let mut i = end;
    while i > min_offset {
        i -= 1;
        if chars[i].is_whitespace() {
            return Some(i + 1);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SourceHints, SourceType};

    fn parsed(text: &str) -> ParsedContent {
        ParsedContent::without_structure(text.to_string(), SourceHints::new("t.txt", text.len() as u64, SourceType::PlainText))
    }

    #[tokio::test]
    async fn respects_max_chunk_size_ceiling() {
        let text = "word ".repeat(500);
        let options = ChunkingOptions {
            max_chunk_size: 100,
            overlap_size: 10,
            ..Default::default()
        };
        let strategy = FixedSizeStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.content.chars().count() <= options.hard_ceiling());
        }
    }

    #[tokio::test]
    async fn indices_are_monotonic_and_starts_nondecreasing() {
        let text = "abcdefgh ".repeat(50);
        let options = ChunkingOptions {
            max_chunk_size: 40,
            overlap_size: 8,
            ..Default::default()
        };
        let strategy = FixedSizeStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        for w in chunks.windows(2) {
            assert_eq!(w[0].index + 1, w[1].index);
            assert!(w[1].location.start_char >= w[0].location.start_char);
        }
    }

    #[tokio::test]
    async fn empty_text_yields_no_chunks() {
        let strategy = FixedSizeStrategy::new();
        let chunks = strategy.chunk(&parsed(""), &ChunkingOptions::default()).await.unwrap();
        assert!(chunks.is_empty());
    }
}
