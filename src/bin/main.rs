//! `ragflux` CLI: a thin driver over [`ragflux_rs::pipeline::PipelineOrchestrator`]
//! for one-off extraction, chunking, full cached processing, and post-hoc
//! quality evaluation.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use ragflux_rs::cache::ResultCache;
use ragflux_rs::chunking::StrategyRegistry;
use ragflux_rs::data::{ChunkingOptions, RefiningOptions};
use ragflux_rs::error::{PipelineError, StageKind};
use ragflux_rs::pipeline::PipelineOrchestrator;
use ragflux_rs::quality::QualityEngine;
use ragflux_rs::readers::{CancelToken, ReaderRegistry};

#[derive(Parser)]
#[command(name = "ragflux", about = "Streaming document-to-chunk pipeline for RAG")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run just the Extract stage and print how much text came out.
    Extract { file: PathBuf },
    /// Run Extract -> Parse -> Refine -> Chunk, bypassing the cache.
    Chunk {
        file: PathBuf,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long, default_value_t = 512)]
        max_chunk_size: usize,
        #[arg(long, default_value_t = 64)]
        overlap_size: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run the full, cached pipeline for one file.
    Process {
        file: PathBuf,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Jsonl)]
        format: OutputFormat,
    },
    /// Chunk a file, then score the result with `QualityEngine`.
    Evaluate {
        file: PathBuf,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long, default_value_t = 7)]
        questions: usize,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

fn build_options(strategy: Option<String>, max_chunk_size: usize, overlap_size: usize) -> ChunkingOptions {
    let mut options = ChunkingOptions::default();
    if let Some(strategy) = strategy {
        options.strategy = strategy;
    }
    options.max_chunk_size = max_chunk_size;
    options.overlap_size = overlap_size;
    options
}

fn orchestrator(cache_dir: Option<PathBuf>) -> PipelineOrchestrator {
    let cache = match cache_dir {
        Some(dir) => Arc::new(ResultCache::new(256 * 1024 * 1024).with_disk_dir(dir)),
        None => Arc::new(ResultCache::new(256 * 1024 * 1024)),
    };
    PipelineOrchestrator::new(ReaderRegistry::with_builtins(), cache, None, None, StrategyRegistry::with_builtins())
}

/// Maps a pipeline failure onto a process exit code: the stage that failed
/// when known, 130 for cooperative cancellation (matching the shell
/// SIGINT convention), 1 otherwise.
fn exit_code_for(err: &PipelineError) -> u8 {
    if err.is_cancellation() {
        return 130;
    }
    match err.stage_kind() {
        Some(StageKind::Extract) => 11,
        Some(StageKind::Parse) => 12,
        Some(StageKind::Refine) => 13,
        Some(StageKind::Chunk) => 14,
        Some(StageKind::Enrich) => 15,
        None => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let cancel = CancelToken::new();

    let result = match cli.command {
        Command::Extract { file } => run_extract(&file, &cancel).await,
        Command::Chunk { file, strategy, max_chunk_size, overlap_size, format } => {
            run_chunk(&file, strategy, max_chunk_size, overlap_size, format, &cancel).await
        }
        Command::Process { file, strategy, cache_dir, format } => run_process(&file, strategy, cache_dir, format, &cancel).await,
        Command::Evaluate { file, strategy, questions } => run_evaluate(&file, strategy, questions, &cancel).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run_extract(file: &PathBuf, cancel: &CancelToken) -> Result<(), PipelineError> {
    let orchestrator = orchestrator(None);
    let raw = orchestrator.extract(file, cancel).await?;
    println!("{} {} chars extracted from {}", "ok:".green().bold(), raw.text.len(), raw.hints.file_name);
    Ok(())
}

async fn run_chunk(
    file: &PathBuf,
    strategy: Option<String>,
    max_chunk_size: usize,
    overlap_size: usize,
    format: OutputFormat,
    cancel: &CancelToken,
) -> Result<(), PipelineError> {
    let orchestrator = orchestrator(None);
    let options = build_options(strategy, max_chunk_size, overlap_size);
    let raw = orchestrator.extract(file, cancel).await?;
    let parsed = orchestrator.parse(raw);
    let refined = orchestrator.refine(parsed, &RefiningOptions::default());
    let chunks = orchestrator.chunk(&refined, &options).await?;
    print_chunks(&chunks, format);
    Ok(())
}

async fn run_process(
    file: &PathBuf,
    strategy: Option<String>,
    cache_dir: Option<PathBuf>,
    format: OutputFormat,
    cancel: &CancelToken,
) -> Result<(), PipelineError> {
    let cache_dir = cache_dir.or_else(|| dirs::cache_dir().map(|d| d.join("ragflux")));
    let orchestrator = orchestrator(cache_dir);
    let options = build_options(strategy, 512, 64);
    let chunks = orchestrator.process(file, &options, cancel).await?;
    print_chunks(&chunks, format);
    Ok(())
}

async fn run_evaluate(file: &PathBuf, strategy: Option<String>, questions: usize, cancel: &CancelToken) -> Result<(), PipelineError> {
    let orchestrator = orchestrator(None);
    let options = build_options(strategy, 512, 64);
    let raw = orchestrator.extract(file, cancel).await?;
    let parsed = orchestrator.parse(raw);
    let refined = orchestrator.refine(parsed, &RefiningOptions::default());
    let chunks = orchestrator.chunk(&refined, &options).await?;

    let engine = QualityEngine::new();
    let metrics = engine.metrics(&chunks);
    println!("{}", "quality metrics".bold());
    println!("  average completeness:  {:.2}", metrics.average_completeness);
    println!("  content consistency:   {:.2}", metrics.content_consistency);
    println!("  boundary quality:      {:.2}", metrics.boundary_quality);
    println!("  size distribution:     {:.2}", metrics.size_distribution);
    println!("  overlap effectiveness: {:.2}", metrics.overlap_effectiveness);

    let qa = engine.generate_questions(&refined, questions, &Default::default()).await;
    let answerability = engine.validate_answerability(&qa, &chunks);
    println!(
        "{} {}/{} answerable, {} high quality, avg confidence {:.2}",
        "answerability:".bold(),
        answerability.answerable,
        answerability.total,
        answerability.high_quality,
        answerability.avg_confidence
    );

    for rec in engine.recommendations(&metrics) {
        println!("{} {}", "suggest:".yellow(), rec);
    }
    Ok(())
}

fn print_chunks(chunks: &[ragflux_rs::data::Chunk], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for chunk in chunks {
                println!("--- chunk {} ({} chars) ---", chunk.index, chunk.content.len());
                println!("{}", chunk.content);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(chunks).unwrap_or_default());
        }
        OutputFormat::Jsonl => {
            for chunk in chunks {
                if let Ok(line) = serde_json::to_string(chunk) {
                    println!("{line}");
                }
            }
        }
    }
}
