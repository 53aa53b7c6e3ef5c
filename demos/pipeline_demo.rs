//! End-to-end walkthrough: write a sample markdown file to a temp
//! directory, run it through the cached pipeline with the Auto strategy,
//! then score the result with `QualityEngine`.

use std::sync::Arc;

use ragflux_rs::cache::ResultCache;
use ragflux_rs::chunking::StrategyRegistry;
use ragflux_rs::data::ChunkingOptions;
use ragflux_rs::pipeline::PipelineOrchestrator;
use ragflux_rs::quality::QualityEngine;
use ragflux_rs::readers::{CancelToken, ReaderRegistry};

const SAMPLE: &str = r#"
# Incident Report: API Gateway Outage

On March 3rd, the API gateway experienced a 12-minute outage affecting roughly
8% of inbound traffic. The root cause was a misconfigured rate limiter that
rejected valid requests after a routine config rollout.

## Timeline

1. 14:02 UTC -- error rate begins climbing past the alerting threshold.
2. 14:06 UTC -- on-call engineer pages in, confirms the rate limiter change.
3. 14:09 UTC -- rollback initiated.
4. 14:14 UTC -- error rate returns to baseline.

## Impact

| Metric | Before | During | After |
| --- | --- | --- | --- |
| p99 latency | 120ms | 4200ms | 118ms |
| error rate | 0.1% | 8.4% | 0.1% |
| requests dropped | 0 | ~42,000 | 0 |

## Follow-up Actions

The team will add a canary stage to the rate limiter rollout pipeline and a
synthetic check that exercises the gateway's 99th-percentile error budget
before promoting a new limiter configuration to production.
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("incident-report.md");
    std::fs::write(&path, SAMPLE.trim())?;

    println!("ragflux pipeline demo");
    println!("=====================\n");

    let orchestrator = PipelineOrchestrator::new(
        ReaderRegistry::with_builtins(),
        Arc::new(ResultCache::new(64 * 1024 * 1024)),
        None,
        None,
        StrategyRegistry::with_builtins(),
    );

    let options = ChunkingOptions {
        strategy: "Auto".to_string(),
        max_chunk_size: 300,
        overlap_size: 40,
        ..Default::default()
    };

    let chunks = orchestrator.process(&path, &options, &CancelToken::new()).await?;
    println!("produced {} chunks\n", chunks.len());
    for chunk in &chunks {
        println!("--- chunk {} via {} ({} chars) ---", chunk.index, chunk.strategy_name, chunk.content.len());
        println!("{}\n", chunk.content);
    }

    let engine = QualityEngine::new();
    let metrics = engine.metrics(&chunks);
    println!("quality metrics");
    println!("  average completeness:  {:.2}", metrics.average_completeness);
    println!("  content consistency:   {:.2}", metrics.content_consistency);
    println!("  boundary quality:      {:.2}", metrics.boundary_quality);

    for rec in engine.recommendations(&metrics) {
        println!("suggest: {rec}");
    }

    Ok(())
}
