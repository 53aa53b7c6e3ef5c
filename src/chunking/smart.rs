//! Sentence-integrity-guaranteed splitter. Never cuts inside a sentence;
//! accumulates until the size limit, emitting early once ≥70% full and
//! continuing, if needed, up to the safety ceiling before forcing a cut.

use async_trait::async_trait;

use crate::chunking::helper::ChunkingHelper;
use crate::chunking::ChunkingStrategy;
use crate::data::{Chunk, ChunkingOptions, ParsedContent};
use crate::error::PipelineResult;
use crate::overlap::{split_sentences, AdaptiveOverlapManager};

/// A chunk is eligible for early emission once its buffer reaches this
/// fraction of `max_chunk_size`.
const COMPLETENESS_THRESHOLD: f32 = 0.7;

#[derive(Debug, Default, Clone)]
pub struct SmartStrategy {
    helper: ChunkingHelper,
    overlap_manager: AdaptiveOverlapManager,
}

impl SmartStrategy {
    pub fn new() -> Self {
        Self {
            helper: ChunkingHelper::new(),
            overlap_manager: AdaptiveOverlapManager::new(),
        }
    }
}

struct Sentence<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn locate_all_sentences(text: &str) -> Vec<Sentence<'_>> {
    let base_ptr = text.as_ptr() as usize;
    split_sentences(text)
        .into_iter()
        .map(|s| {
            let rel = s.as_ptr() as usize - base_ptr;
            Sentence {
                text: s,
                start: rel,
                end: rel + s.len(),
            }
        })
        .collect()
}

#[async_trait]
impl ChunkingStrategy for SmartStrategy {
    fn name(&self) -> &'static str {
        "Smart"
    }

    async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        let text = &parsed.text;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let sentences = locate_all_sentences(text);
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let max_size = options.max_chunk_size.max(1);
        let early_emit_size = (max_size as f32 * COMPLETENESS_THRESHOLD) as usize;
        let ceiling = options.hard_ceiling();

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut index = 0usize;

        let mut buf: Vec<&str> = Vec::new();
        let mut buf_start = sentences[0].start;
        let mut buf_end = sentences[0].start;
        let mut buf_len = 0usize;
        let mut forced_boundary = false;

        let mut emit = |buf: &mut Vec<&str>,
                        buf_start: &mut usize,
                        buf_end: usize,
                        forced: bool,
                        chunks: &mut Vec<Chunk>,
                        index: &mut usize| {
            if buf.is_empty() {
                return;
            }
            let content = buf.join(" ");
            let mut chunk = self.helper.build_chunk(parsed, *index, content, self.name(), *buf_start, buf_end);
            if let Some(prev) = chunks.last() {
                if options.overlap_size > 0 {
                    // Reserve the overlap budget inside the ceiling: the
                    // stitched `overlap + " " + content` must never exceed
                    // it, per the EnforceMaxSize invariant.
                    let budget = ceiling.saturating_sub(chunk.content.len() + 1);
                    if budget > 0 {
                        let size = self.overlap_manager.optimal_overlap(&prev.content, &chunk.content, options).min(budget);
                        if size > 0 {
                            let overlap_text = self.overlap_manager.build_overlap_text(&prev.content, size);
                            let overlap_text = crate::overlap::fit_to_budget(&overlap_text, budget);
                            if !overlap_text.is_empty() {
                                chunk.content = format!("{} {}", overlap_text, chunk.content);
                            }
                        }
                    }
                }
            }
            if forced {
                chunk.set_prop("ForcedBoundary", true);
                chunk.set_prop(
                    "ForcedBoundaryReason",
                    "accumulated to the safety ceiling without a sentence terminator",
                );
            }
            chunks.push(chunk);
            *index += 1;
            buf.clear();
        };

        for (i, sentence) in sentences.iter().enumerate() {
            let is_last = i == sentences.len() - 1;

            if buf.is_empty() {
                buf_start = sentence.start;
            }

            // A single sentence that already exceeds the ceiling can never
            // fit whole; cascade to a word-level split (EnforceMaxSize),
            // flushing whatever's accumulated first.
            if sentence.text.len() > ceiling {
                if !buf.is_empty() {
                    emit(&mut buf, &mut buf_start, buf_end, false, &mut chunks, &mut index);
                    buf_len = 0;
                }
                let mut cursor = sentence.start;
                let mut piece = String::new();
                let mut piece_start = sentence.start;
                for word in sentence.text.split_whitespace() {
                    if !piece.is_empty() && piece.len() + word.len() + 1 > max_size {
                        let mut chunk = self.helper.build_chunk(
                            parsed, index, piece.clone(), self.name(), piece_start, cursor,
                        );
                        chunk.set_prop("ForcedBoundary", true);
                        chunk.set_prop("ForcedBoundaryReason", "single sentence exceeded max_chunk_size");
                        chunks.push(chunk);
                        index += 1;
                        piece.clear();
                        piece_start = cursor;
                        forced_boundary = true;
                    }
                    if !piece.is_empty() {
                        piece.push(' ');
                    }
                    piece.push_str(word);
                    cursor += word.len() + 1;
                }
                if !piece.trim().is_empty() {
                    let mut chunk = self.helper.build_chunk(
                        parsed, index, piece.clone(), self.name(), piece_start, sentence.end,
                    );
                    chunk.set_prop("ForcedBoundary", true);
                    chunk.set_prop("ForcedBoundaryReason", "single sentence exceeded max_chunk_size");
                    chunks.push(chunk);
                    index += 1;
                    forced_boundary = true;
                }
                buf_start = sentence.end;
                continue;
            }

            let projected = buf_len + sentence.text.len() + 1;

            if projected > ceiling && !buf.is_empty() {
                // Would blow the hard ceiling even after the safety
                // allowance: force-emit what's accumulated so far.
                emit(&mut buf, &mut buf_start, buf_end, true, &mut chunks, &mut index);
                buf_len = 0;
                buf_start = sentence.start;
                forced_boundary = true;
            }

            buf.push(sentence.text);
            buf_len += sentence.text.len() + 1;
            buf_end = sentence.end;

            let reached_soft_limit = buf_len >= early_emit_size;
            let reached_ceiling = buf_len >= ceiling;

            if !is_last && reached_ceiling {
                emit(&mut buf, &mut buf_start, buf_end, true, &mut chunks, &mut index);
                buf_len = 0;
                forced_boundary = true;
            } else if !is_last && reached_soft_limit && buf_len >= max_size {
                emit(&mut buf, &mut buf_start, buf_end, false, &mut chunks, &mut index);
                buf_len = 0;
            }
        }

        if !buf.is_empty() {
            emit(&mut buf, &mut buf_start, buf_end, false, &mut chunks, &mut index);
        }

        let _ = forced_boundary;
        ChunkingHelper::finalize_indices(&mut chunks);
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SourceHints, SourceType};

    fn parsed(text: &str) -> ParsedContent {
        ParsedContent::without_structure(text.to_string(), SourceHints::new("t.txt", text.len() as u64, SourceType::PlainText))
    }

    #[tokio::test]
    async fn every_chunk_ends_on_sentence_terminator() {
        let text = "First sentence here. Second sentence follows nicely. Third one wraps up. Fourth and final sentence ends it.".repeat(3);
        let options = ChunkingOptions {
            max_chunk_size: 80,
            overlap_size: 10,
            ..Default::default()
        };
        let strategy = SmartStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        for (i, c) in chunks.iter().enumerate() {
            let trimmed = c.content.trim_end();
            let is_last = i == chunks.len() - 1;
            let ends_well = trimmed.ends_with(['.', '!', '?', '。']);
            assert!(ends_well || is_last, "chunk {i} doesn't end on a sentence: {trimmed:?}");
        }
    }

    #[tokio::test]
    async fn overlap_never_pushes_content_past_the_hard_ceiling() {
        let sentence = "Alpha beta gamma delta epsilon zeta eta theta iota kappa. ";
        let text = sentence.repeat(40);
        let options = ChunkingOptions {
            max_chunk_size: 100,
            overlap_size: 40,
            ..Default::default()
        };
        let strategy = SmartStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        assert!(chunks.len() > 2, "test needs several chunks to exercise overlap stitching");
        for c in &chunks {
            assert!(
                c.content.len() <= options.hard_ceiling(),
                "chunk of {} bytes exceeded the hard ceiling of {}",
                c.content.len(),
                options.hard_ceiling()
            );
        }
    }

    #[tokio::test]
    async fn honours_safety_ceiling_with_no_terminators() {
        let text = "word ".repeat(3000); // no sentence terminators at all
        let options = ChunkingOptions {
            max_chunk_size: 200,
            overlap_size: 20,
            ..Default::default()
        };
        let strategy = SmartStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.content.len() <= options.hard_ceiling() + 32, "chunk exceeded ceiling: {}", c.content.len());
        }
        assert!(chunks.iter().any(|c| c.props.contains_key("ForcedBoundary")));
    }
}
