//! The four-stage orchestrator: Extract → Parse → Refine → Chunk, with an
//! optional Enrich tail. Owns the reader registry, the strategy registry,
//! the optional LLM/vision services, and the shared result cache for the
//! lifetime of one orchestrator instance.

pub mod streaming;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cache::{self, CacheKey, ResultCache};
use crate::chunking::auto::AutoStrategy;
use crate::chunking::{ChunkingStrategy, StrategyRegistry, StrategyServices};
use crate::data::{Chunk, ChunkingOptions, ParsedContent, RawContent, RefiningOptions};
use crate::error::{PipelineError, PipelineResult, StageKind};
use crate::logging::{report_progress, ProgressEvent};
use crate::readers::{CancelToken, ReaderRegistry};
use crate::services::{ImageToTextService, TextCompletionService};

/// One item of the `process_with_progress` stream: a stage-boundary event
/// or a finished chunk, interleaved on a single channel so a caller can
/// render progress without waiting for the whole file to finish chunking.
#[derive(Debug, Clone)]
pub enum ProgressOrChunk {
    Progress(ProgressEvent),
    Chunk(Chunk),
}

/// Reads current resident memory via `/proc/self/statm` on Linux; returns
/// `None` on any other platform or on read failure, in which case callers
/// treat the process as not memory-constrained.
fn resident_memory_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        let page_size = 4096u64;
        Some(pages * page_size)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Composes the reader registry, the strategy registry, the optional
/// services, and the shared cache into one pipeline run surface.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    readers: ReaderRegistry,
    cache: Arc<ResultCache>,
    strategies: StrategyRegistry,
    services: StrategyServices,
    memory_pressure_threshold_bytes: u64,
}

impl PipelineOrchestrator {
    pub fn new(
        readers: ReaderRegistry,
        cache: Arc<ResultCache>,
        llm: Option<Arc<dyn TextCompletionService>>,
        vision: Option<Arc<dyn ImageToTextService>>,
        strategies: StrategyRegistry,
    ) -> Self {
        Self {
            readers,
            cache,
            strategies,
            services: StrategyServices { llm, vision },
            memory_pressure_threshold_bytes: 500 * 1024 * 1024,
        }
    }

    pub fn with_memory_pressure_threshold(mut self, bytes: u64) -> Self {
        self.memory_pressure_threshold_bytes = bytes;
        self
    }

    fn memory_constrained(&self) -> bool {
        resident_memory_bytes().map(|bytes| bytes > self.memory_pressure_threshold_bytes).unwrap_or(false)
    }

    /// §4.1: extract raw content from a file via the reader registry.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub async fn extract(&self, path: &Path, cancel: &CancelToken) -> PipelineResult<RawContent> {
        report_progress(ProgressEvent::ExtractStarted {
            file_name: path.file_name().and_then(|n| n.to_str()).unwrap_or("?").to_string(),
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        });
        let result = self.readers.extract(path, cancel).await;
        match &result {
            Ok(raw) => report_progress(ProgressEvent::ExtractCompleted { text_len: raw.text.len() }),
            Err(e) => report_progress(ProgressEvent::StageError {
                kind: StageKind::Extract,
                message: e.to_string(),
            }),
        }
        result.map_err(|e| PipelineError::stage(StageKind::Extract, e))
    }

    /// §4.1: normalise raw content into structured, parsed content.
    /// Parse errors fall back to treating the raw text as unstructured
    /// rather than failing the run, per the failure semantics summary.
    pub fn parse(&self, raw: RawContent) -> ParsedContent {
        let sections = extract_sections(&raw.text);
        let section_count = sections.len();
        let parsed = ParsedContent {
            text: raw.text,
            sections,
            page_ranges: raw.hints.page_ranges.clone(),
            hints: raw.hints,
        };
        report_progress(ProgressEvent::ParseCompleted { section_count });
        parsed
    }

    /// §4.1: cleanup/restructure pass. Idempotent given identical
    /// input+options. Refine errors return the input unchanged.
    pub fn refine(&self, parsed: ParsedContent, options: &RefiningOptions) -> ParsedContent {
        let result = apply_refining(parsed, options);
        report_progress(ProgressEvent::RefineCompleted { applied: true });
        result
    }

    /// §4.1: run the named (or Auto) strategy over parsed content.
    #[tracing::instrument(skip_all, fields(text_len = parsed.text.len(), strategy = %options.strategy))]
    pub async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        report_progress(ProgressEvent::ChunkingStarted {
            total_chars: parsed.text.len(),
            strategy: options.strategy.clone(),
        });

        let strategy: Arc<dyn ChunkingStrategy> = if options.strategy == "Auto" {
            Arc::new(AutoStrategy::new(self.strategies.clone(), self.services.clone(), self.memory_constrained()))
        } else {
            self.strategies
                .get(&options.strategy)
                .ok_or_else(|| PipelineError::InvalidInput(format!("unknown strategy: {}", options.strategy)))?
        };

        let chunks = strategy.chunk(parsed, options).await.map_err(|e| PipelineError::stage(StageKind::Chunk, e))?;
        report_progress(ProgressEvent::ChunkingCompleted { chunk_count: chunks.len() });
        Ok(chunks)
    }

    /// The full pipeline for one file, honouring the cache policy of
    /// §4.13: consult on entry, register an in-flight build on miss, store
    /// only on a successful, non-cancelled completion.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub async fn process(&self, path: &Path, options: &ChunkingOptions, cancel: &CancelToken) -> PipelineResult<Vec<Chunk>> {
        self.process_with_refining(path, options, &RefiningOptions::default(), cancel).await
    }

    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub async fn process_with_refining(
        &self,
        path: &Path,
        options: &ChunkingOptions,
        refining: &RefiningOptions,
        cancel: &CancelToken,
    ) -> PipelineResult<Vec<Chunk>> {
        let file_bytes = cache::hash_file(path).await?;
        let key = match CacheKey::compute(&file_bytes, options) {
            Ok(k) => k,
            Err(_) => {
                // Cache errors never fail the run; degrade to uncached
                // direct processing.
                return self.process_uncached(path, options, refining, cancel).await;
            }
        };

        report_progress(ProgressEvent::CacheLookup { hit: false });
        if let Some(entry) = self.cache.get(&key) {
            report_progress(ProgressEvent::CacheLookup { hit: true });
            return Ok(entry.chunks);
        }

        match self.cache.start_build_or_wait(&key) {
            cache::BuildSlot::Follower(notify) => {
                report_progress(ProgressEvent::CacheCoalesced);
                notify.notified().await;
                if let Some(entry) = self.cache.get(&key) {
                    return Ok(entry.chunks);
                }
                self.process_uncached(path, options, refining, cancel).await
            }
            cache::BuildSlot::Leader => {
                let result = self.process_uncached(path, options, refining, cancel).await;
                match &result {
                    Ok(chunks) if !cancel.is_cancelled() => {
                        self.cache.put(key.clone(), cache::entry_from_chunks(chunks.clone()), None);
                    }
                    _ => {}
                }
                self.cache.finish_build(&key);
                result
            }
        }
    }

    /// §4.1: `process_with_progress(path, options) -> lazy sequence of
    /// ProgressEvent|Chunk`. Runs the same cache policy and stage sequence
    /// as [`Self::process`], but streams each stage-boundary event and
    /// each finished chunk out through one bounded channel as soon as it
    /// is available, instead of returning only the final `Vec<Chunk>`.
    pub fn process_with_progress(
        &self,
        path: PathBuf,
        options: ChunkingOptions,
        cancel: CancelToken,
    ) -> mpsc::Receiver<PipelineResult<ProgressOrChunk>> {
        let (tx, rx) = mpsc::channel(32);
        let orchestrator = self.clone();

        tokio::spawn(async move {
            let file_bytes = match cache::hash_file(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            let key = CacheKey::compute(&file_bytes, &options).ok();

            if let Some(key) = &key {
                if let Some(entry) = orchestrator.cache.get(key) {
                    if tx.send(Ok(ProgressOrChunk::Progress(ProgressEvent::CacheLookup { hit: true }))).await.is_err() {
                        return;
                    }
                    for chunk in entry.chunks {
                        if tx.send(Ok(ProgressOrChunk::Chunk(chunk))).await.is_err() {
                            return;
                        }
                    }
                    return;
                }
                if tx.send(Ok(ProgressOrChunk::Progress(ProgressEvent::CacheLookup { hit: false }))).await.is_err() {
                    return;
                }
            }

            let raw = match orchestrator.extract(&path, &cancel).await {
                Ok(raw) => raw,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if tx
                .send(Ok(ProgressOrChunk::Progress(ProgressEvent::ExtractCompleted { text_len: raw.text.len() })))
                .await
                .is_err()
            {
                return;
            }

            let parsed = orchestrator.parse(raw);
            if tx
                .send(Ok(ProgressOrChunk::Progress(ProgressEvent::ParseCompleted {
                    section_count: parsed.sections.len(),
                })))
                .await
                .is_err()
            {
                return;
            }

            let refined = orchestrator.refine(parsed, &RefiningOptions::default());
            if tx.send(Ok(ProgressOrChunk::Progress(ProgressEvent::RefineCompleted { applied: true }))).await.is_err() {
                return;
            }

            let chunks = match orchestrator.chunk(&refined, &options).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            if tx
                .send(Ok(ProgressOrChunk::Progress(ProgressEvent::ChunkingCompleted { chunk_count: chunks.len() })))
                .await
                .is_err()
            {
                return;
            }

            if let Some(key) = key {
                if !cancel.is_cancelled() {
                    orchestrator.cache.put(key, cache::entry_from_chunks(chunks.clone()), None);
                }
            }

            for chunk in chunks {
                if tx.send(Ok(ProgressOrChunk::Chunk(chunk))).await.is_err() {
                    return;
                }
            }
        });

        rx
    }

    async fn process_uncached(
        &self,
        path: &Path,
        options: &ChunkingOptions,
        refining: &RefiningOptions,
        cancel: &CancelToken,
    ) -> PipelineResult<Vec<Chunk>> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let raw = self.extract(path, cancel).await?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let parsed = self.parse(raw);
        let refined = self.refine(parsed, refining);
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        self.chunk(&refined, options).await
    }
}

/// Builds the `Section` tree from markdown-style `#`-headers, nesting by
/// level. A document with no headers parses to an empty section list,
/// which is a valid `ParsedContent` (chunking falls back to treating the
/// whole text as unstructured).
fn extract_sections(text: &str) -> Vec<crate::data::Section> {
    use crate::data::{Section, Span};

    let header_re = regex::Regex::new(r"^(#{1,6})\s+(.+)$").unwrap();

    // (section, level) pairs currently open, outermost first.
    let mut stack: Vec<Section> = Vec::new();
    let mut roots: Vec<Section> = Vec::new();
    let mut offset = 0usize;

    let close_to_level = |stack: &mut Vec<Section>, roots: &mut Vec<Section>, level: u8, end: usize| {
        while stack.last().map(|s| s.level >= level).unwrap_or(false) {
            let mut closed = stack.pop().unwrap();
            closed.char_span.end = end;
            match stack.last_mut() {
                Some(parent) => parent.subsections.push(closed),
                None => roots.push(closed),
            }
        }
    };

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if let Some(caps) = header_re.captures(trimmed) {
            let level = caps[1].len() as u8;
            let heading = caps[2].trim().to_string();

            close_to_level(&mut stack, &mut roots, level, offset);
            stack.push(Section::new(heading, level, Span::new(offset, text.len())));
        }
        offset += line.len();
    }
    close_to_level(&mut stack, &mut roots, 1, text.len());
    roots
}

/// Applies the cleanup policies named by `options`, in the order
/// `spec.md` §4.1 lists them. Idempotent: running twice with the same
/// options yields the same text as running once.
fn apply_refining(mut parsed: ParsedContent, options: &crate::data::RefiningOptions) -> ParsedContent {
    if options.clean_whitespace {
        parsed.text = clean_whitespace(&parsed.text);
    }
    if options.remove_page_numbers {
        parsed.text = remove_standalone_numeric_lines(&parsed.text);
    }
    if options.remove_headers_footers {
        parsed.text = remove_repeated_short_lines(&parsed.text);
    }
    if options.convert_to_markdown {
        parsed.text = ensure_blank_line_after_headers(&parsed.text);
    }
    parsed
}

fn clean_whitespace(text: &str) -> String {
    let collapsed: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in collapsed {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn remove_standalone_numeric_lines(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().chars().all(|c| c.is_ascii_digit()) || l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drops short lines (<40 chars) that repeat verbatim three or more
/// times, the common signature of a running header/footer.
fn remove_repeated_short_lines(text: &str) -> String {
    use std::collections::HashMap;
    let lines: Vec<&str> = text.lines().collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in &lines {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.len() < 40 {
            *counts.entry(trimmed).or_insert(0) += 1;
        }
    }
    lines
        .into_iter()
        .filter(|line| counts.get(line.trim()).copied().unwrap_or(0) < 3)
        .collect::<Vec<_>>()
        .join("\n")
}

fn ensure_blank_line_after_headers(text: &str) -> String {
    let header_re = regex::Regex::new(r"^#{1,6}\s+\S").unwrap();
    let mut out = String::with_capacity(text.len());
    let lines: Vec<&str> = text.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);
        out.push('\n');
        let next_is_blank = lines.get(i + 1).map(|l| l.trim().is_empty()).unwrap_or(true);
        if header_re.is_match(line) && !next_is_blank {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::ReaderRegistry;

    fn orchestrator() -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            ReaderRegistry::with_builtins(),
            Arc::new(ResultCache::new(10_000_000)),
            None,
            None,
            StrategyRegistry::with_builtins(),
        )
    }

    #[tokio::test]
    async fn process_chunks_a_plain_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "First sentence here. Second sentence follows nicely.").unwrap();

        let orchestrator = orchestrator();
        let chunks = orchestrator
            .process(&path, &ChunkingOptions::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(!chunks.is_empty());
    }

    #[tokio::test]
    async fn second_call_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Cached content here. More text follows along nicely.").unwrap();

        let orchestrator = orchestrator();
        let options = ChunkingOptions::default();
        let first = orchestrator.process(&path, &options, &CancelToken::new()).await.unwrap();
        let second = orchestrator.process(&path, &options, &CancelToken::new()).await.unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn cancellation_before_extract_returns_cancelled_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "content").unwrap();

        let orchestrator = orchestrator();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = orchestrator.process(&path, &ChunkingOptions::default(), &cancel).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn process_with_progress_interleaves_events_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "First sentence here. Second sentence follows. Third wraps up nicely.").unwrap();

        let orchestrator = orchestrator();
        let mut rx = orchestrator.process_with_progress(path, ChunkingOptions::default(), CancelToken::new());

        let mut saw_chunking_completed = false;
        let mut chunk_count = 0;
        while let Some(item) = rx.recv().await {
            match item.unwrap() {
                ProgressOrChunk::Progress(ProgressEvent::ChunkingCompleted { .. }) => saw_chunking_completed = true,
                ProgressOrChunk::Chunk(_) => chunk_count += 1,
                _ => {}
            }
        }
        assert!(saw_chunking_completed);
        assert!(chunk_count > 0);
    }

    #[tokio::test]
    async fn unknown_extension_surfaces_extract_stage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.weird");
        std::fs::write(&path, "content").unwrap();

        let orchestrator = orchestrator();
        let result = orchestrator.process(&path, &ChunkingOptions::default(), &CancelToken::new()).await;
        let err = result.unwrap_err();
        assert_eq!(err.stage_kind(), Some(StageKind::Extract));
    }
}
