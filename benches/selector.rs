use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ragflux_rs::chunking::selector::AdaptiveStrategySelector;
use ragflux_rs::chunking::{StrategyRegistry, StrategyServices};
use ragflux_rs::data::{ChunkingOptions, ParsedContent, SourceHints, SourceType};

fn narrative_document(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {i} tells a story about the system's history and the decisions that shaped \
                 it over several long, flowing sentences meant to resemble prose rather than structure."
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn technical_document(sections: usize) -> String {
    let mut text = String::new();
    for i in 0..sections {
        text.push_str(&format!("## Section {i}\n\n"));
        text.push_str("1. First requirement shall apply.\n2. Second requirement must apply.\n\n");
        text.push_str("```rust\nfn example() {}\n```\n\n");
        text.push_str("| Field | Value |\n| --- | --- |\n| a | 1 |\n\n");
    }
    text
}

fn parsed(text: String) -> ParsedContent {
    ParsedContent::without_structure(text.clone(), SourceHints::new("bench.md", text.len() as u64, SourceType::Markdown))
}

fn bench_analyze(c: &mut Criterion) {
    let selector = AdaptiveStrategySelector::new();
    let mut group = c.benchmark_group("selector_analyze");

    for &size in &[5, 20, 80] {
        let narrative = parsed(narrative_document(size));
        let technical = parsed(technical_document(size));

        group.bench_with_input(BenchmarkId::new("narrative", size), &size, |b, _| {
            b.iter(|| selector.analyze(black_box(&narrative)));
        });
        group.bench_with_input(BenchmarkId::new("technical", size), &size, |b, _| {
            b.iter(|| selector.analyze(black_box(&technical)));
        });
    }
    group.finish();
}

fn bench_select_without_llm(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let selector = AdaptiveStrategySelector::new();
    let registry = StrategyRegistry::with_builtins();
    let services = StrategyServices::default();
    let options = ChunkingOptions::default();

    let mut group = c.benchmark_group("selector_select");
    let narrative = parsed(narrative_document(20));
    let technical = parsed(technical_document(20));

    group.bench_function("narrative", |b| {
        b.to_async(&rt).iter(|| selector.select(black_box(&narrative), &options, &registry, &services, false));
    });
    group.bench_function("technical", |b| {
        b.to_async(&rt).iter(|| selector.select(black_box(&technical), &options, &registry, &services, false));
    });
    group.finish();
}

criterion_group!(benches, bench_analyze, bench_select_without_llm);
criterion_main!(benches);
