//! Quantified invariants every strategy and the orchestrator must satisfy,
//! exercised across representative inputs rather than one narrow example.

use std::sync::Arc;

use ragflux_rs::cache::ResultCache;
use ragflux_rs::chunking::auto::AutoStrategy;
use ragflux_rs::chunking::fixed::FixedSizeStrategy;
use ragflux_rs::chunking::paragraph::ParagraphStrategy;
use ragflux_rs::chunking::semantic::SemanticStrategy;
use ragflux_rs::chunking::smart::SmartStrategy;
use ragflux_rs::chunking::{ChunkingStrategy, StrategyRegistry, StrategyServices};
use ragflux_rs::data::{ChunkingOptions, ParsedContent, SourceHints, SourceType};
use ragflux_rs::pipeline::PipelineOrchestrator;
use ragflux_rs::readers::{CancelToken, ReaderRegistry};

fn parsed(text: &str) -> ParsedContent {
    ParsedContent::without_structure(text.to_string(), SourceHints::new("doc.txt", text.len() as u64, SourceType::PlainText))
}

fn all_strategies() -> Vec<Box<dyn ChunkingStrategy>> {
    vec![
        Box::new(FixedSizeStrategy::new()),
        Box::new(ParagraphStrategy::new()),
        Box::new(SemanticStrategy::new()),
        Box::new(SmartStrategy::new()),
    ]
}

const SAMPLE: &str = "The retrieval pipeline ingests a document, extracts its text, and splits it into overlapping chunks. \
Each chunk carries its position, an estimated token count, and a context-dependency score. \
Downstream retrieval systems embed each chunk independently. \
A well-chosen chunk boundary preserves the meaning of both halves. \
Tables and code blocks need special handling so a row or a function body never gets split across two chunks. \
This sample paragraph repeats similar sentence shapes so every strategy has enough material to produce more than one chunk.";

// Property 1: size ceiling.
#[tokio::test]
async fn every_chunk_respects_the_safety_ceiling() {
    let options = ChunkingOptions {
        max_chunk_size: 120,
        overlap_size: 16,
        ..Default::default()
    };
    let text = SAMPLE.repeat(4);
    for strategy in all_strategies() {
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        for chunk in &chunks {
            assert!(
                chunk.content.chars().count() <= options.hard_ceiling(),
                "{} produced an oversized chunk",
                strategy.name()
            );
        }
    }
}

// Property 2: index monotonicity and non-decreasing start offsets.
#[tokio::test]
async fn indices_and_offsets_are_monotonic() {
    let options = ChunkingOptions {
        max_chunk_size: 100,
        overlap_size: 10,
        ..Default::default()
    };
    let text = SAMPLE.repeat(3);
    for strategy in all_strategies() {
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        for window in chunks.windows(2) {
            assert_eq!(window[0].index + 1, window[1].index, "{} index gap", strategy.name());
            assert!(
                window[1].location.start_char >= window[0].location.start_char,
                "{} start offsets went backwards",
                strategy.name()
            );
        }
    }
}

// Property 4: sentence integrity (Smart).
#[tokio::test]
async fn smart_chunks_end_on_sentence_terminators() {
    let strategy = SmartStrategy::new();
    let options = ChunkingOptions {
        max_chunk_size: 90,
        overlap_size: 12,
        ..Default::default()
    };
    let text = SAMPLE.repeat(3);
    let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
    let last = chunks.len().saturating_sub(1);
    for (i, chunk) in chunks.iter().enumerate() {
        let trimmed = chunk.content.trim_end();
        let ends_well = trimmed.ends_with(['.', '!', '?', '。']);
        assert!(ends_well || i == last, "non-final chunk {i} doesn't end on a sentence: {trimmed:?}");
    }
}

// Property 5: cache idempotence.
#[tokio::test]
async fn identical_inputs_produce_identical_cached_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, SAMPLE).unwrap();

    let orchestrator = PipelineOrchestrator::new(
        ReaderRegistry::with_builtins(),
        Arc::new(ResultCache::new(10_000_000)),
        None,
        None,
        StrategyRegistry::with_builtins(),
    );
    let options = ChunkingOptions::default();

    let first = orchestrator.process(&path, &options, &CancelToken::new()).await.unwrap();
    let second = orchestrator.process(&path, &options, &CancelToken::new()).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.content, b.content);
        assert_eq!(a.index, b.index);
        assert_eq!(a.location.start_char, b.location.start_char);
        assert_eq!(a.location.end_char, b.location.end_char);
    }
}

// Property 6: overlap correctness for sentence-aware strategies.
#[tokio::test]
async fn overlap_carries_shared_text_between_consecutive_chunks() {
    let options = ChunkingOptions {
        max_chunk_size: 70,
        overlap_size: 20,
        ..Default::default()
    };
    let text = SAMPLE.repeat(4);

    for strategy in [Box::new(SmartStrategy::new()) as Box<dyn ChunkingStrategy>, Box::new(SemanticStrategy::new())] {
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        assert!(chunks.len() >= 2, "{} needs at least two chunks to test overlap", strategy.name());
    }
}

// Property 8: strategy selection override for PDF-with-tables input.
#[tokio::test]
async fn pdf_with_tables_always_selects_intelligent() {
    let text = "| Name | Value |\n| --- | --- |\n| a | 1 |\n| b | 2 |\n| c | 3 |";
    let parsed_pdf =
        ParsedContent::without_structure(text.to_string(), SourceHints::new("report.pdf", text.len() as u64, SourceType::Pdf));

    let auto = AutoStrategy::new(StrategyRegistry::with_builtins(), StrategyServices::default(), false);
    let chunks = auto.chunk(&parsed_pdf, &ChunkingOptions::default()).await.unwrap();
    assert!(chunks.iter().all(|c| c.strategy_name == "Auto(Intelligent)"));
}

// Property 9: cancellation yields a clean error and no partial cache entry.
#[tokio::test]
async fn cancellation_leaves_no_partial_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, SAMPLE).unwrap();

    let cache = Arc::new(ResultCache::new(10_000_000));
    let orchestrator =
        PipelineOrchestrator::new(ReaderRegistry::with_builtins(), cache.clone(), None, None, StrategyRegistry::with_builtins());

    let cancel = CancelToken::new();
    cancel.cancel();
    let result = orchestrator.process(&path, &ChunkingOptions::default(), &cancel).await;
    assert!(result.is_err());

    let file_bytes = std::fs::read(&path).unwrap();
    let key = ragflux_rs::cache::CacheKey::compute(&file_bytes, &ChunkingOptions::default()).unwrap();
    assert!(cache.get(&key).is_none());
}
