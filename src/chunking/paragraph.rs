//! Splits on blank lines, combines short paragraphs, splits long ones on
//! sentence boundaries; headers always start a fresh chunk.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::chunking::helper::ChunkingHelper;
use crate::chunking::ChunkingStrategy;
use crate::data::{Chunk, ChunkingOptions, ParsedContent};
use crate::error::PipelineResult;
use crate::overlap::split_sentences;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").unwrap());

const SHORT_PARAGRAPH_THRESHOLD: usize = 50;

#[derive(Debug, Default, Clone)]
pub struct ParagraphStrategy {
    helper: ChunkingHelper,
}

impl ParagraphStrategy {
    pub fn new() -> Self {
        Self {
            helper: ChunkingHelper::new(),
        }
    }
}

struct Paragraph {
    text: String,
    start: usize,
    end: usize,
}

fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut offset = 0usize;
    for block in text.split("\n\n") {
        let leading_ws = block.len() - block.trim_start().len();
        let trimmed = block.trim();
        if !trimmed.is_empty() {
            let start = offset + leading_ws;
            paragraphs.push(Paragraph {
                text: trimmed.to_string(),
                start,
                end: start + trimmed.len(),
            });
        }
        offset += block.len() + 2; // account for the "\n\n" separator
    }
    paragraphs
}

#[async_trait]
impl ChunkingStrategy for ParagraphStrategy {
    fn name(&self) -> &'static str {
        "Paragraph"
    }

    async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        let paragraphs = split_paragraphs(&parsed.text);
        if paragraphs.is_empty() {
            return Ok(Vec::new());
        }

        let max_size = options.max_chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut index = 0usize;

        let mut buffer = String::new();
        let mut buf_start: Option<usize> = None;
        let mut buf_end = 0usize;

        let mut flush = |buffer: &mut String, buf_start: &mut Option<usize>, chunks: &mut Vec<Chunk>, index: &mut usize, buf_end: usize| {
            if let Some(start) = buf_start.take() {
                if !buffer.trim().is_empty() {
                    let chunk = self.helper.build_chunk(parsed, *index, buffer.clone(), self.name(), start, buf_end);
                    chunks.push(chunk);
                    *index += 1;
                }
            }
            buffer.clear();
        };

        for para in &paragraphs {
            let is_header = HEADER_RE.is_match(&para.text);
            let would_overflow = !buffer.is_empty() && buffer.len() + para.text.len() + 2 > max_size;

            if is_header || would_overflow {
                flush(&mut buffer, &mut buf_start, &mut chunks, &mut index, buf_end);
            }

            if para.text.len() > max_size {
                // Long paragraph: flush whatever's buffered, then split this
                // paragraph on sentence boundaries.
                flush(&mut buffer, &mut buf_start, &mut chunks, &mut index, buf_end);
                let mut sub = String::new();
                let mut sub_start = para.start;
                let mut cursor = para.start;
                for sentence in split_sentences(&para.text) {
                    if !sub.is_empty() && sub.len() + sentence.len() + 1 > max_size {
                        let chunk = self.helper.build_chunk(parsed, index, sub.clone(), self.name(), sub_start, cursor);
                        chunks.push(chunk);
                        index += 1;
                        sub.clear();
                        sub_start = cursor;
                    }
                    if !sub.is_empty() {
                        sub.push(' ');
                    }
                    sub.push_str(sentence);
                    cursor += sentence.len() + 1;
                }
                if !sub.trim().is_empty() {
                    let chunk = self.helper.build_chunk(parsed, index, sub.clone(), self.name(), sub_start, para.end);
                    chunks.push(chunk);
                    index += 1;
                }
                continue;
            }

            if buffer.is_empty() {
                buf_start = Some(para.start);
            } else if para.text.len() < SHORT_PARAGRAPH_THRESHOLD
                || buffer.len() < SHORT_PARAGRAPH_THRESHOLD
            {
                buffer.push_str("\n\n");
            } else {
                buffer.push_str("\n\n");
            }
            buffer.push_str(&para.text);
            buf_end = para.end;
        }
        flush(&mut buffer, &mut buf_start, &mut chunks, &mut index, buf_end);

        ChunkingHelper::finalize_indices(&mut chunks);
        Ok(chunks)
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
    async fn combines_short_paragraphs() {
        let text = "Short one.\n\nShort two.\n\nShort three.";
        let options = ChunkingOptions {
            max_chunk_size: 200,
            ..Default::default()
        };
        let strategy = ParagraphStrategy::new();
        let chunks = strategy.chunk(&parsed(text), &options).await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn header_starts_new_chunk() {
        let text = "Intro paragraph with some reasonable length text here.\n\n# Heading\n\nBody paragraph that follows the heading nicely.";
        let options = ChunkingOptions {
            max_chunk_size: 60,
            ..Default::default()
        };
        let strategy = ParagraphStrategy::new();
        let chunks = strategy.chunk(&parsed(text), &options).await.unwrap();
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().any(|c| c.content.starts_with('#')));
    }

    #[tokio::test]
    async fn long_paragraph_splits_on_sentences() {
        let text = "Sentence one is here. Sentence two follows. Sentence three continues. Sentence four wraps up this paragraph nicely.";
        let options = ChunkingOptions {
            max_chunk_size: 40,
            ..Default::default()
        };
        let strategy = ParagraphStrategy::new();
        let chunks = strategy.chunk(&parsed(text), &options).await.unwrap();
        assert!(chunks.len() > 1);
    }
}
