//! Structure-aware splitter that preserves tables, section headers, and
//! code blocks. The most involved strategy in the family: structure
//! analysis → semantic-unit extraction → contextual chunking → an
//! optimisation pass → per-chunk enrichment.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::boundary::BoundaryQualityEvaluator;
use crate::chunking::helper::ChunkingHelper;
use crate::chunking::{classify_domain, technical_keyword_categories, ChunkingStrategy};
use crate::data::{Chunk, ChunkingOptions, ParsedContent, StructuralRole};
use crate::error::PipelineResult;
use crate::overlap::{split_sentences, AdaptiveOverlapManager};

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(\S.*)$").unwrap());
static LIST_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([-*+]|\d+[.)])\s+\S").unwrap());
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```").unwrap());
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|.*\|").unwrap());

/// A score in `[0, 1]` below which the optimisation pass reprocesses a
/// chunk with sentence-level splitting.
const QUALITY_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, PartialEq)]
enum UnitKind {
    Header(u8),
    Table,
    CodeBlock,
    ListItem,
    Content,
}

#[derive(Debug, Clone)]
struct Unit {
    kind: UnitKind,
    text: String,
    start: usize,
    end: usize,
    importance: f32,
    contextual_relevance: f32,
}

#[derive(Debug, Default, Clone)]
pub struct IntelligentStrategy {
    helper: ChunkingHelper,
    evaluator: BoundaryQualityEvaluator,
    overlap_manager: AdaptiveOverlapManager,
}

impl IntelligentStrategy {
    pub fn new() -> Self {
        Self {
            helper: ChunkingHelper::new(),
            evaluator: BoundaryQualityEvaluator::new(),
            overlap_manager: AdaptiveOverlapManager::new(),
        }
    }

    /// Step 2: coalesce contiguous table-row lines into one table unit per
    /// `spec.md` §4.3; everything else becomes a one-line unit. Operates
    /// line-by-line (never a greedy multiline regex) to avoid catastrophic
    /// backtracking, per the design note in §9.
    fn extract_units(&self, text: &str) -> Vec<Unit> {
        let lines: Vec<&str> = text.lines().collect();
        let mut units = Vec::new();
        let mut offset = 0usize;
        let mut line_offsets = Vec::with_capacity(lines.len() + 1);
        for line in &lines {
            line_offsets.push(offset);
            offset += line.len() + 1;
        }
        line_offsets.push(offset);

        let mut i = 0usize;
        let mut in_code_block = false;
        while i < lines.len() {
            let line = lines[i];

            if CODE_FENCE_RE.is_match(line) {
                let start = line_offsets[i];
                let mut j = i + 1;
                while j < lines.len() && !CODE_FENCE_RE.is_match(lines[j]) {
                    j += 1;
                }
                let end_line = std::cmp::min(j, lines.len() - 1);
                let end = line_offsets[end_line] + lines[end_line].len();
                let block_text = lines[i..=end_line].join("\n");
                units.push(Unit {
                    kind: UnitKind::CodeBlock,
                    text: block_text,
                    start,
                    end,
                    importance: 0.7,
                    contextual_relevance: 0.5,
                });
                i = end_line + 1;
                in_code_block = false;
                continue;
            }

            if TABLE_ROW_RE.is_match(line) {
                let start = line_offsets[i];
                let mut j = i;
                let mut last_table_line = i;
                while j < lines.len() {
                    if TABLE_ROW_RE.is_match(lines[j]) {
                        last_table_line = j;
                        j += 1;
                    } else if lines[j].trim().is_empty() && j + 1 < lines.len() && TABLE_ROW_RE.is_match(lines[j + 1]) {
                        // a single blank line between table rows is still
                        // part of the same table for coalescing purposes
                        j += 1;
                    } else {
                        break;
                    }
                }
                let end = line_offsets[last_table_line] + lines[last_table_line].len();
                let table_text = lines[i..=last_table_line].join("\n");
                units.push(Unit {
                    kind: UnitKind::Table,
                    text: table_text,
                    start,
                    end,
                    importance: 1.0,
                    contextual_relevance: 0.4,
                });
                i = last_table_line + 1;
                continue;
            }

            if line.trim().is_empty() {
                i += 1;
                continue;
            }

            if let Some(caps) = HEADER_RE.captures(line) {
                let level = caps[1].len() as u8;
                units.push(Unit {
                    kind: UnitKind::Header(level),
                    text: line.to_string(),
                    start: line_offsets[i],
                    end: line_offsets[i] + line.len(),
                    importance: 1.0 - 0.5 * ((level.saturating_sub(1)) as f32 / 5.0),
                    contextual_relevance: 0.6,
                });
                i += 1;
                continue;
            }

            if LIST_ITEM_RE.is_match(line) {
                units.push(Unit {
                    kind: UnitKind::ListItem,
                    text: line.to_string(),
                    start: line_offsets[i],
                    end: line_offsets[i] + line.len(),
                    importance: 0.5,
                    contextual_relevance: 0.5,
                });
                i += 1;
                continue;
            }

            let importance = content_importance(line);
            units.push(Unit {
                kind: UnitKind::Content,
                text: line.to_string(),
                start: line_offsets[i],
                end: line_offsets[i] + line.len(),
                importance,
                contextual_relevance: 0.5,
            });
            i += 1;
        }
        let _ = in_code_block;
        units
    }

    /// Step 3: contextual chunking. Returns `(content, start, end,
    /// contains_table, carried_overlap_ratio)`.
    fn contextual_chunk(&self, units: &[Unit], options: &ChunkingOptions) -> Vec<(String, usize, usize, bool)> {
        let has_table = units.iter().any(|u| u.kind == UnitKind::Table);
        let window = if has_table {
            options.max_chunk_size * 2
        } else {
            options.max_chunk_size
        };
        let max_table_inline = (window as f32 * 2.5) as usize;

        let mut results = Vec::new();
        let mut buffer: Vec<&Unit> = Vec::new();
        let mut buf_len = 0usize;

        let mut flush = |buffer: &mut Vec<&Unit>, buf_len: &mut usize, results: &mut Vec<(String, usize, usize, bool)>| {
            if buffer.is_empty() {
                return;
            }
            let start = buffer[0].start;
            let end = buffer[buffer.len() - 1].end;
            let contains_table = buffer.iter().any(|u| u.kind == UnitKind::Table);
            let content = buffer.iter().map(|u| u.text.as_str()).collect::<Vec<_>>().join("\n");
            results.push((content, start, end, contains_table));
            buffer.clear();
            *buf_len = 0;
        };

        for unit in units {
            if unit.kind == UnitKind::Table && unit.text.len() > max_table_inline {
                flush(&mut buffer, &mut buf_len, &mut results);
                for part in split_table_preserving_header(&unit.text, window) {
                    results.push((part.0, unit.start, unit.end, true));
                    let _ = part.1;
                }
                continue;
            }

            if let UnitKind::Header(_) = unit.kind {
                if buf_len as f32 >= 0.3 * window as f32 {
                    flush(&mut buffer, &mut buf_len, &mut results);
                }
            }

            let projected = buf_len + unit.text.len() + 1;
            if projected > window && !buffer.is_empty() {
                flush(&mut buffer, &mut buf_len, &mut results);
            }

            buf_len += unit.text.len() + 1;
            buffer.push(unit);
        }
        flush(&mut buffer, &mut buf_len, &mut results);
        results
    }

    /// Step 4: optimisation pass. Reprocess low-quality or oversized
    /// chunks.
    fn optimize(&self, content: String, options: &ChunkingOptions) -> Vec<String> {
        let ceiling = options.hard_ceiling();
        if content.len() <= options.max_chunk_size {
            let lines: Vec<&str> = content.lines().collect();
            let score = self.score_chunk(&lines);
            if score >= QUALITY_THRESHOLD {
                return vec![content];
            }
        }
        if content.len() <= ceiling && content.len() <= options.max_chunk_size {
            return vec![content];
        }
        self.enforce_max_size(&content, options)
    }

    fn score_chunk(&self, lines: &[&str]) -> f32 {
        if lines.len() < 2 {
            return 1.0;
        }
        let mut total = 0.0;
        let mut count = 0;
        for i in 1..lines.len() {
            let quality = self.evaluator.evaluate(lines, i);
            total += quality.quality;
            count += 1;
        }
        if count == 0 {
            1.0
        } else {
            total / count as f32
        }
    }

    /// Cascades sentence-then-word splitting to guarantee the ceiling,
    /// per `spec.md` §4.3 step 4 and §9's Open Question on the safety
    /// factor.
    fn enforce_max_size(&self, content: &str, options: &ChunkingOptions) -> Vec<String> {
        let max_size = options.max_chunk_size.max(1);
        let ceiling = options.hard_ceiling();
        let mut parts = Vec::new();
        let mut buf = String::new();

        for sentence in split_sentences(content) {
            if sentence.len() > ceiling {
                if !buf.is_empty() {
                    parts.push(std::mem::take(&mut buf));
                }
                let mut piece = String::new();
                for word in sentence.split_whitespace() {
                    if !piece.is_empty() && piece.len() + word.len() + 1 > max_size {
                        parts.push(std::mem::take(&mut piece));
                    }
                    if !piece.is_empty() {
                        piece.push(' ');
                    }
                    piece.push_str(word);
                }
                if !piece.is_empty() {
                    parts.push(piece);
                }
                continue;
            }
            if !buf.is_empty() && buf.len() + sentence.len() + 1 > max_size {
                parts.push(std::mem::take(&mut buf));
            }
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(sentence);
        }
        if !buf.is_empty() {
            parts.push(buf);
        }
        if parts.is_empty() {
            parts.push(content.to_string());
        }
        parts
    }

    /// Step 5: per-chunk enrichment — structural role, technical keyword
    /// categories, document domain.
    fn enrich(&self, chunk: &mut Chunk, raw_lines_hint: &str) {
        let role = classify_role(raw_lines_hint);
        chunk.set_prop(crate::data::prop_keys::STRUCTURAL_ROLE, role.as_str());

        let categories = technical_keyword_categories(&chunk.content);
        if !categories.is_empty() {
            chunk.set_prop(crate::data::prop_keys::DOCUMENT_KEYWORDS, categories);
        }

        let domain = classify_domain(&chunk.content);
        chunk.set_prop(crate::data::prop_keys::CONTENT_TYPE, format!("{domain:?}"));
    }
}

fn classify_role(text: &str) -> StructuralRole {
    let first_line = text.lines().next().unwrap_or("");
    if HEADER_RE.is_match(first_line) {
        StructuralRole::Header
    } else if CODE_FENCE_RE.is_match(first_line) || text.contains("```") {
        StructuralRole::CodeBlock
    } else if TABLE_ROW_RE.is_match(first_line) {
        StructuralRole::Table
    } else if LIST_ITEM_RE.is_match(first_line) {
        StructuralRole::List
    } else {
        StructuralRole::Content
    }
}

fn content_importance(line: &str) -> f32 {
    let len_score = (line.len() as f32 / 200.0).min(1.0) * 0.5;
    let keyword_score = if technical_keyword_categories(line).is_empty() { 0.0 } else { 0.3 };
    (0.2 + len_score + keyword_score).min(1.0)
}

/// Split an over-long table on row boundaries, keeping the header row and
/// the separator row as a prefix on every part. Never breaks a row
/// mid-row.
fn split_table_preserving_header(table_text: &str, window: usize) -> Vec<(String, usize)> {
    let lines: Vec<&str> = table_text.lines().collect();
    if lines.len() < 2 {
        return vec![(table_text.to_string(), 0)];
    }
    let header = lines[0];
    let separator = lines[1];
    let prefix_len = header.len() + separator.len() + 2;

    let mut parts = Vec::new();
    let mut current = format!("{}\n{}", header, separator);
    let mut current_len = prefix_len;
    let mut rows_in_part = 0;

    for row in &lines[2..] {
        if rows_in_part > 0 && current_len + row.len() + 1 > window {
            parts.push((current.clone(), 0));
            current = format!("{}\n{}", header, separator);
            current_len = prefix_len;
            rows_in_part = 0;
        }
        current.push('\n');
        current.push_str(row);
        current_len += row.len() + 1;
        rows_in_part += 1;
    }
    if rows_in_part > 0 {
        parts.push((current, 0));
    }
    if parts.is_empty() {
        parts.push((table_text.to_string(), 0));
    }
    parts
}

#[async_trait]
impl ChunkingStrategy for IntelligentStrategy {
    fn name(&self) -> &'static str {
        "Intelligent"
    }

    async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        if parsed.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let units = self.extract_units(&parsed.text);
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let raw_chunks = self.contextual_chunk(&units, options);
        let ceiling = options.hard_ceiling();

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut index = 0usize;

        for (content, start, end, contains_table) in raw_chunks {
            let pieces = if contains_table {
                vec![content]
            } else {
                self.optimize(content, options)
            };

            let piece_count = pieces.len();
            let span_len = (end - start).max(1);
            let mut cursor = start;
            for (i, piece) in pieces.into_iter().enumerate() {
                let piece_end = if i + 1 == piece_count {
                    end
                } else {
                    std::cmp::min(cursor + (span_len / piece_count).max(piece.len()), end)
                };
                let mut chunk = self.helper.build_chunk(parsed, index, piece.clone(), self.name(), cursor, piece_end);

                if options.overlap_size > 0 {
                    if let Some(prev) = chunks.last() {
                        let carry_ratio = units
                            .iter()
                            .find(|u| u.start <= prev.location.end_char && u.end >= prev.location.end_char.saturating_sub(1))
                            .map(|u| u.contextual_relevance)
                            .unwrap_or(0.5);
                        // Reserve the overlap budget inside the ceiling: the
                        // stitched `overlap + " " + content` must never
                        // exceed it, per the EnforceMaxSize invariant.
                        let budget = ceiling.saturating_sub(chunk.content.len() + 1);
                        let size = ((self.overlap_manager.optimal_overlap(&prev.content, &chunk.content, options) as f32
                            * carry_ratio) as usize)
                            .min(budget);
                        if size > 0 {
                            let overlap_text = self.overlap_manager.build_overlap_text(&prev.content, size);
                            let overlap_text = crate::overlap::fit_to_budget(&overlap_text, budget);
                            if !overlap_text.is_empty() {
                                chunk.content = format!("{} {}", overlap_text, chunk.content);
                            }
                        }
                    }
                }

                self.enrich(&mut chunk, &piece);
                chunks.push(chunk);
                index += 1;
                cursor = piece_end;
            }
        }

        ChunkingHelper::finalize_indices(&mut chunks);
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SourceHints, SourceType};

    fn parsed(text: &str) -> ParsedContent {
        ParsedContent::without_structure(text.to_string(), SourceHints::new("t.md", text.len() as u64, SourceType::Markdown))
    }

    fn make_table(rows: usize) -> String {
        let mut s = String::from("| Col A | Col B |\n| --- | --- |\n");
        for i in 0..rows {
            s.push_str(&format!("| value {i} | value {i} |\n"));
        }
        s
    }

    #[tokio::test]
    async fn scenario_s2_table_integrity() {
        let text = make_table(20);
        let options = ChunkingOptions {
            max_chunk_size: 200,
            strategy: "Intelligent".to_string(),
            ..Default::default()
        };
        let strategy = IntelligentStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            let first_line = chunk.content.lines().next().unwrap_or("");
            if chunk.content.contains('|') {
                assert!(
                    first_line.contains("Col A") || first_line.contains("---") || !TABLE_ROW_RE.is_match(first_line) == false,
                    "chunk does not start with header/separator or valid row: {first_line:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn headers_force_chunk_boundary_when_buffer_large() {
        let mut text = String::new();
        text.push_str(&"Filler content line that is reasonably long to build up the buffer size. ".repeat(5));
        text.push('\n');
        text.push_str("# New Section\n");
        text.push_str("More content follows the new section header nicely.");
        let options = ChunkingOptions {
            max_chunk_size: 150,
            strategy: "Intelligent".to_string(),
            ..Default::default()
        };
        let strategy = IntelligentStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        assert!(chunks.len() >= 2);
    }

    #[tokio::test]
    async fn overlap_never_pushes_content_past_the_hard_ceiling() {
        let mut text = String::new();
        for i in 0..30 {
            text.push_str(&format!(
                "Paragraph number {i} discusses an unrelated topic with enough words to matter. "
            ));
            text.push_str("\n\n");
        }
        let options = ChunkingOptions {
            max_chunk_size: 120,
            overlap_size: 50,
            strategy: "Intelligent".to_string(),
            ..Default::default()
        };
        let strategy = IntelligentStrategy::new();
        let chunks = strategy.chunk(&parsed(&text), &options).await.unwrap();
        assert!(chunks.len() > 2, "test needs several chunks to exercise overlap stitching");
        for c in &chunks {
            assert!(
                c.content.len() <= options.hard_ceiling(),
                "chunk of {} bytes exceeded the hard ceiling of {}",
                c.content.len(),
                options.hard_ceiling()
            );
        }
    }

    #[tokio::test]
    async fn enriches_chunks_with_structural_role() {
        let text = "# Header\n\nSome plain content here that is just prose.";
        let options = ChunkingOptions {
            max_chunk_size: 500,
            strategy: "Intelligent".to_string(),
            ..Default::default()
        };
        let strategy = IntelligentStrategy::new();
        let chunks = strategy.chunk(&parsed(text), &options).await.unwrap();
        assert!(chunks.iter().any(|c| c.props.contains_key(crate::data::prop_keys::STRUCTURAL_ROLE)));
    }
}
