//! Sentence-aggregated splitter respecting paragraph breaks.
//!
//! Accumulates `MinSentences..MaxSentences` sentences without crossing a
//! paragraph boundary, emitting whenever the buffer reaches
//! `max_chunk_size` or `MaxSentences`, with adaptive sentence-aligned
//! overlap carried into the next chunk.

use async_trait::async_trait;

use crate::chunking::helper::ChunkingHelper;
use crate::chunking::ChunkingStrategy;
use crate::data::{Chunk, ChunkingOptions, ParsedContent};
use crate::error::PipelineResult;
use crate::overlap::{split_sentences, AdaptiveOverlapManager};

const MIN_SENTENCES: usize = 2;
const MAX_SENTENCES: usize = 8;

#[derive(Debug, Default, Clone)]
pub struct SemanticStrategy {
    helper: ChunkingHelper,
    overlap_manager: AdaptiveOverlapManager,
}

impl SemanticStrategy {
    pub fn new() -> Self {
        Self {
            helper: ChunkingHelper::new(),
            overlap_manager: AdaptiveOverlapManager::new(),
        }
    }
}

struct SentenceSpan<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// Locate each sentence's offset within the source text (split_sentences
/// returns borrowed slices, so offsets are recoverable via pointer math).
fn locate_sentences<'a>(paragraph: &'a str, paragraph_offset: usize) -> Vec<SentenceSpan<'a>> {
    let base_ptr = paragraph.as_ptr() as usize;
    split_sentences(paragraph)
        .into_iter()
        .map(|s| {
            let rel_start = s.as_ptr() as usize - base_ptr;
            SentenceSpan {
                text: s,
                start: paragraph_offset + rel_start,
                end: paragraph_offset + rel_start + s.len(),
            }
        })
        .collect()
}

#[async_trait]
impl ChunkingStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "Semantic"
    }

    async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        let text = &parsed.text;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut sentences: Vec<SentenceSpan> = Vec::new();
        let mut offset = 0usize;
        for block in text.split("\n\n") {
            let leading_ws = block.len() - block.trim_start().len();
            sentences.extend(locate_sentences(block, offset + leading_ws));
            offset += block.len() + 2;
        }

        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let max_size = options.max_chunk_size.max(1);
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut index = 0usize;

        let mut buf_sentences: Vec<&str> = Vec::new();
        let mut buf_start = sentences[0].start;
        let mut buf_end = sentences[0].start;
        let mut buf_len = 0usize;

        for sentence in &sentences {
            let projected_len = buf_len + sentence.text.len() + 1;
            let would_overflow_size = buf_len > 0 && projected_len > max_size;
            let would_overflow_count = buf_sentences.len() >= MAX_SENTENCES;

            if (would_overflow_size || would_overflow_count) && buf_sentences.len() >= MIN_SENTENCES {
                let content = buf_sentences.join(" ");
                let mut chunk = self.helper.build_chunk(parsed, index, content, self.name(), buf_start, buf_end);
                self.attach_overlap(&mut chunk, &chunks, options);
                chunks.push(chunk);
                index += 1;
                buf_sentences.clear();
                buf_len = 0;
                buf_start = sentence.start;
            }

            if buf_sentences.is_empty() {
                buf_start = sentence.start;
            }
            buf_sentences.push(sentence.text);
            buf_len += sentence.text.len() + 1;
            buf_end = sentence.end;
        }

        if !buf_sentences.is_empty() {
            let content = buf_sentences.join(" ");
            let mut chunk = self.helper.build_chunk(parsed, index, content, self.name(), buf_start, buf_end);
            self.attach_overlap(&mut chunk, &chunks, options);
            chunks.push(chunk);
        }

        ChunkingHelper::finalize_indices(&mut chunks);
        Ok(chunks)
    }
}

impl SemanticStrategy {
    /// Prepend adaptive overlap text carried from the previous chunk, per
    /// `spec.md` §4.6.
    fn attach_overlap(&self, chunk: &mut Chunk, previous: &[Chunk], options: &ChunkingOptions) {
        let Some(prev) = previous.last() else { return };
        if options.overlap_size == 0 {
            return;
        }
        let size = self.overlap_manager.optimal_overlap(&prev.content, &chunk.content, options);
        if size == 0 {
            return;
        }
        let overlap_text = self.overlap_manager.build_overlap_text(&prev.content, size);
        if overlap_text.is_empty() {
            return;
        }
        chunk.content = format!("{} {}", overlap_text, chunk.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SourceHints, SourceType};

    fn parsed(text: &str) -> ParsedContent {
        ParsedContent::without_structure(text.to_string(), SourceHints::new("t.md", text.len() as u64, SourceType::Markdown))
    }

    #[tokio::test]
    async fn scenario_s1_two_sentence_document() {
        let text = "# Title\n\nAlpha. Beta. Gamma.";
        let options = ChunkingOptions {
            max_chunk_size: 40,
            overlap_size: 8,
            strategy: "Semantic".to_string(),
            ..Default::default()
        };
        let strategy = SemanticStrategy::new();
        let chunks = strategy.chunk(&parsed(text), &options).await.unwrap();
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.content.len() <= 60, "chunk too long: {:?}", c.content);
        }
    }

    #[tokio::test]
    async fn indices_are_sequential() {
        let text = "One sentence here. Two sentences follow now. Three come after. Four wrap up. Five extend further. Six continue on. Seven more sentences. Eight finishes it. Nine starts anew. Ten ends the set.";
        let options = ChunkingOptions {
            max_chunk_size: 60,
            overlap_size: 5,
            ..Default::default()
        };
        let strategy = SemanticStrategy::new();
        let chunks = strategy.chunk(&parsed(text), &options).await.unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }
}
