//! `ragflux-rs`: a streaming document-to-chunk pipeline for retrieval-
//! augmented generation.
//!
//! A document flows through four mandatory stages -- Extract, Parse,
//! Refine, Chunk -- with an optional Enrich tail, orchestrated by
//! [`pipeline::PipelineOrchestrator`]. Extraction is pluggable per file
//! extension via [`readers::ReaderRegistry`]; chunking is pluggable per
//! strategy via [`chunking::StrategyRegistry`], topped by an adaptive
//! [`chunking::auto::AutoStrategy`] that picks a strategy from document
//! characteristics, optionally consulting an LLM. Every stage degrades
//! gracefully when an optional collaborator (an LLM, a vision service, a
//! binary-format reader) is absent: the pipeline never fails a run over a
//! missing enrichment.
//!
//! Results are content-addressed by `sha256(file bytes) + options` in
//! [`cache::ResultCache`], with in-flight build coalescing so concurrent
//! callers requesting the same (file, options) pair share one chunking
//! run instead of duplicating work.

pub mod boundary;
pub mod cache;
pub mod chunking;
pub mod config;
pub mod context_dependency;
pub mod data;
pub mod error;
pub mod language_detector;
pub mod logging;
pub mod overlap;
pub mod pipeline;
pub mod quality;
pub mod readers;
pub mod services;
pub mod token_estimator;

pub use cache::{CacheKey, ResultCache};
pub use chunking::{ChunkingStrategy, StrategyRegistry, StrategyServices};
pub use config::RuntimeConfig;
pub use data::{Chunk, ChunkingOptions, ParsedContent, RawContent, RefiningOptions};
pub use error::{PipelineError, PipelineResult, StageKind};
pub use pipeline::PipelineOrchestrator;
pub use quality::QualityEngine;
pub use readers::{CancelToken, ReaderRegistry};
