use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ragflux_rs::chunking::fixed::FixedSizeStrategy;
use ragflux_rs::chunking::intelligent::IntelligentStrategy;
use ragflux_rs::chunking::semantic::SemanticStrategy;
use ragflux_rs::chunking::smart::SmartStrategy;
use ragflux_rs::chunking::ChunkingStrategy;
use ragflux_rs::data::{ChunkingOptions, ParsedContent, SourceHints, SourceType};

/// A realistic document with headings, paragraphs, and a table, repeated to
/// hit the requested size.
fn generate_document(target_bytes: usize) -> String {
    let paragraphs = [
        "The architecture employs a microservices pattern with each service owning its data store. \
         Services communicate through an event bus using CloudEvents. This ensures loose coupling \
         while maintaining eventual consistency across boundaries.",
        "Performance requirements dictate that the system must handle 10,000 concurrent connections \
         per node. Load balancing uses consistent hashing to minimize connection migration during \
         scaling events.",
        "Security considerations include mandatory mTLS for all east-west traffic within the cluster. \
         Tokens are validated at the gateway with key rotation every 24 hours.",
        "| Metric | Target |\n| --- | --- |\n| p50 latency | 20ms |\n| p99 latency | 150ms |\n| error rate | 0.1% |",
        "The deployment model uses blue-green deployments for stateless services and canary releases \
         for stateful components. Rollback is automated when error rates exceed the baseline.",
    ];

    let mut text = String::with_capacity(target_bytes + 500);
    let mut i = 0;
    while text.len() < target_bytes {
        if i > 0 && i % 3 == 0 {
            text.push_str(&format!("\n\n## Section {}\n\n", i / 3));
        }
        text.push_str(paragraphs[i % paragraphs.len()]);
        text.push_str("\n\n");
        i += 1;
    }
    text
}

fn parsed(text: &str) -> ParsedContent {
    ParsedContent::without_structure(text.to_string(), SourceHints::new("bench.md", text.len() as u64, SourceType::Markdown))
}

fn bench_strategy_by_doc_size(c: &mut Criterion, group_name: &str, strategy: &dyn ChunkingStrategy) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group(group_name);
    group.sample_size(20);

    let options = ChunkingOptions {
        max_chunk_size: 500,
        overlap_size: 64,
        strategy: strategy.name().to_string(),
        ..Default::default()
    };

    for &doc_size in &[10_000, 50_000, 100_000] {
        let doc = parsed(&generate_document(doc_size));

        group.bench_with_input(BenchmarkId::new("doc_size", format!("{}kb", doc_size / 1000)), &doc_size, |b, _| {
            b.to_async(&rt).iter(|| async { strategy.chunk(black_box(&doc), black_box(&options)).await.unwrap() });
        });
    }
    group.finish();
}

fn bench_fixed(c: &mut Criterion) {
    bench_strategy_by_doc_size(c, "chunking_fixed", &FixedSizeStrategy::new());
}

fn bench_semantic(c: &mut Criterion) {
    bench_strategy_by_doc_size(c, "chunking_semantic", &SemanticStrategy::new());
}

fn bench_smart(c: &mut Criterion) {
    bench_strategy_by_doc_size(c, "chunking_smart", &SmartStrategy::new());
}

fn bench_intelligent(c: &mut Criterion) {
    bench_strategy_by_doc_size(c, "chunking_intelligent", &IntelligentStrategy::new());
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("chunking_chunk_sizes");
    group.sample_size(20);

    let doc = parsed(&generate_document(50_000));
    let strategy = SmartStrategy::new();

    for &chunk_size in &[500, 1000, 2000, 4000, 8000] {
        let options = ChunkingOptions {
            max_chunk_size: chunk_size,
            overlap_size: chunk_size / 8,
            strategy: "Smart".to_string(),
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("max_chunk", chunk_size), &chunk_size, |b, _| {
            b.to_async(&rt).iter(|| async { strategy.chunk(black_box(&doc), black_box(&options)).await.unwrap() });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fixed, bench_semantic, bench_smart, bench_intelligent, bench_chunk_sizes);
criterion_main!(benches);
