//! Logging and progress reporting for the pipeline.
//!
//! Mirrors the teacher crate's split: a [`ProgressEvent`] enum fired at
//! stage boundaries, consumed by a pluggable [`ProgressHandler`] that
//! library users and the CLI can swap out independently of `tracing` spans
//! (which remain on the async stage methods themselves via
//! `#[tracing::instrument]`).

use std::sync::Arc;

use crate::error::StageKind;

/// Progress events emitted at each stage boundary of a pipeline run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Extract stage starting for a given file.
    ExtractStarted { file_name: String, size_bytes: u64 },
    /// Extract stage finished.
    ExtractCompleted { text_len: usize },
    /// Parse stage finished.
    ParseCompleted { section_count: usize },
    /// Refine stage finished (or skipped because no options were given).
    RefineCompleted { applied: bool },
    /// The adaptive selector chose a strategy.
    StrategySelected {
        strategy_name: String,
        confidence: f32,
        used_llm: bool,
    },
    /// Chunking started.
    ChunkingStarted {
        total_chars: usize,
        strategy: String,
    },
    /// Chunking finished.
    ChunkingCompleted { chunk_count: usize },
    /// Enrichment attempted for a chunk; `applied` is false when the LLM
    /// service was unavailable or the call failed (never fatal).
    EnrichmentResult { chunk_index: usize, applied: bool },
    /// Cache was consulted; `hit` distinguishes replay from a fresh build.
    CacheLookup { hit: bool },
    /// Cache entry was coalesced onto an in-flight build for the same key.
    CacheCoalesced,
    /// A stage failed; carries the discriminator so callers can react.
    StageError { kind: StageKind, message: String },
    /// Cooperative cancellation observed; never a failure.
    Cancelled { kind: StageKind },
    /// Debug information.
    Debug { operation: String, details: String },
}

/// Trait for handling progress events.
pub trait ProgressHandler: Send + Sync {
    fn handle_progress(&self, event: ProgressEvent);
}

/// Console progress handler that outputs to stdout with stage tags.
pub struct ConsoleProgressHandler {
    pub show_progress: bool,
    pub show_debug: bool,
}

impl ConsoleProgressHandler {
    pub fn new() -> Self {
        Self {
            show_progress: true,
            show_debug: false,
        }
    }

    pub fn quiet() -> Self {
        Self {
            show_progress: false,
            show_debug: false,
        }
    }

    pub fn verbose() -> Self {
        Self {
            show_progress: true,
            show_debug: true,
        }
    }

    fn format_message(&self, tag: &str, message: &str) -> String {
        format!("[{}] {}", tag, message)
    }
}

impl Default for ConsoleProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandler for ConsoleProgressHandler {
    fn handle_progress(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ExtractStarted { file_name, size_bytes } => {
                if self.show_progress {
                    println!(
                        "{}",
                        self.format_message("extract", &format!("{} ({} bytes)", file_name, size_bytes))
                    );
                }
            }
            ProgressEvent::ExtractCompleted { text_len } => {
                if self.show_debug {
                    println!("{}", self.format_message("extract", &format!("{} chars extracted", text_len)));
                }
            }
            ProgressEvent::ParseCompleted { section_count } => {
                if self.show_debug {
                    println!("{}", self.format_message("parse", &format!("{} sections", section_count)));
                }
            }
            ProgressEvent::RefineCompleted { applied } => {
                if self.show_debug {
                    println!("{}", self.format_message("refine", if applied { "applied" } else { "skipped" }));
                }
            }
            ProgressEvent::StrategySelected { strategy_name, confidence, used_llm } => {
                if self.show_progress {
                    println!(
                        "{}",
                        self.format_message(
                            "select",
                            &format!("{} (confidence {:.2}, llm={})", strategy_name, confidence, used_llm)
                        )
                    );
                }
            }
            ProgressEvent::ChunkingStarted { total_chars, strategy } => {
                if self.show_progress {
                    println!(
                        "{}",
                        self.format_message("chunking", &format!("{} strategy, {} chars", strategy, total_chars))
                    );
                }
            }
            ProgressEvent::ChunkingCompleted { chunk_count } => {
                if self.show_progress {
                    println!("{}", self.format_message("chunking", &format!("{} chunks emitted", chunk_count)));
                }
            }
            ProgressEvent::EnrichmentResult { chunk_index, applied } => {
                if self.show_debug {
                    println!(
                        "{}",
                        self.format_message(
                            "enrich",
                            &format!("chunk {} {}", chunk_index, if applied { "enriched" } else { "skipped" })
                        )
                    );
                }
            }
            ProgressEvent::CacheLookup { hit } => {
                if self.show_debug {
                    println!("{}", self.format_message("cache", if hit { "hit" } else { "miss" }));
                }
            }
            ProgressEvent::CacheCoalesced => {
                if self.show_debug {
                    println!("{}", self.format_message("cache", "coalesced onto in-flight build"));
                }
            }
            ProgressEvent::StageError { kind, message } => {
                eprintln!("{}", self.format_message("error", &format!("{}: {}", kind, message)));
            }
            ProgressEvent::Cancelled { kind } => {
                if self.show_progress {
                    println!("{}", self.format_message("cancelled", &format!("during {}", kind)));
                }
            }
            ProgressEvent::Debug { operation, details } => {
                if self.show_debug {
                    println!("{}", self.format_message("debug", &format!("{}: {}", operation, details)));
                }
            }
        }
    }
}

/// Silent progress handler that does nothing.
pub struct SilentProgressHandler;

impl ProgressHandler for SilentProgressHandler {
    fn handle_progress(&self, _event: ProgressEvent) {}
}

/// Bridges progress events onto the `log` facade.
pub struct LogProgressHandler;

impl ProgressHandler for LogProgressHandler {
    fn handle_progress(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ExtractStarted { file_name, size_bytes } => {
                log::info!("extracting {} ({} bytes)", file_name, size_bytes);
            }
            ProgressEvent::ExtractCompleted { text_len } => {
                log::debug!("extracted {} chars", text_len);
            }
            ProgressEvent::ParseCompleted { section_count } => {
                log::debug!("parsed {} sections", section_count);
            }
            ProgressEvent::RefineCompleted { applied } => {
                log::debug!("refine applied={}", applied);
            }
            ProgressEvent::StrategySelected { strategy_name, confidence, used_llm } => {
                log::info!("selected strategy {} (confidence {:.2}, llm={})", strategy_name, confidence, used_llm);
            }
            ProgressEvent::ChunkingStarted { total_chars, strategy } => {
                log::info!("chunking started: {} strategy, {} chars", strategy, total_chars);
            }
            ProgressEvent::ChunkingCompleted { chunk_count } => {
                log::info!("chunking completed: {} chunks", chunk_count);
            }
            ProgressEvent::EnrichmentResult { chunk_index, applied } => {
                log::debug!("chunk {} enrichment applied={}", chunk_index, applied);
            }
            ProgressEvent::CacheLookup { hit } => {
                log::debug!("cache {}", if hit { "hit" } else { "miss" });
            }
            ProgressEvent::CacheCoalesced => {
                log::debug!("cache build coalesced");
            }
            ProgressEvent::StageError { kind, message } => {
                log::error!("{} stage failed: {}", kind, message);
            }
            ProgressEvent::Cancelled { kind } => {
                log::warn!("cancelled during {}", kind);
            }
            ProgressEvent::Debug { operation, details } => {
                log::debug!("{}: {}", operation, details);
            }
        }
    }
}

/// Global progress handler.
static PROGRESS_HANDLER: std::sync::OnceLock<Arc<dyn ProgressHandler>> = std::sync::OnceLock::new();

/// Initialize the global progress handler. Only the first call takes
/// effect, matching `OnceLock` semantics.
pub fn init_progress_handler(handler: Arc<dyn ProgressHandler>) {
    let _ = PROGRESS_HANDLER.set(handler);
}

fn get_progress_handler() -> Arc<dyn ProgressHandler> {
    PROGRESS_HANDLER
        .get_or_init(|| Arc::new(ConsoleProgressHandler::new()))
        .clone()
}

/// Report a progress event to the currently installed handler.
pub fn report_progress(event: ProgressEvent) {
    let handler = get_progress_handler();
    handler.handle_progress(event);
}
