use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ragflux_rs::data::ChunkingOptions;
use ragflux_rs::overlap::{split_sentences, AdaptiveOverlapManager};

fn sentence_paragraph(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("This is sentence number {i} in a long paragraph meant for overlap benchmarking."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn bench_split_sentences(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap_split_sentences");

    for &count in &[50, 200, 1000] {
        let text = sentence_paragraph(count);
        group.bench_with_input(BenchmarkId::new("sentence_count", count), &count, |b, _| {
            b.iter(|| split_sentences(black_box(&text)));
        });
    }
    group.finish();
}

fn bench_optimal_overlap(c: &mut Criterion) {
    let manager = AdaptiveOverlapManager::new();
    let options = ChunkingOptions {
        overlap_size: 80,
        ..Default::default()
    };
    let mut group = c.benchmark_group("overlap_optimal_overlap");

    for &size in &[200, 1000, 5000] {
        let prev = sentence_paragraph(size / 80);
        let next = sentence_paragraph(size / 80);
        group.bench_with_input(BenchmarkId::new("chunk_size", size), &size, |b, _| {
            b.iter(|| manager.optimal_overlap(black_box(&prev), black_box(&next), black_box(&options)));
        });
    }
    group.finish();
}

fn bench_build_overlap_text(c: &mut Criterion) {
    let manager = AdaptiveOverlapManager::new();
    let prev = sentence_paragraph(200);
    let mut group = c.benchmark_group("overlap_build_overlap_text");

    for &target in &[32, 128, 512] {
        group.bench_with_input(BenchmarkId::new("target_size", target), &target, |b, _| {
            b.iter(|| manager.build_overlap_text(black_box(&prev), black_box(target)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_split_sentences, bench_optimal_overlap, bench_build_overlap_text);
criterion_main!(benches);
