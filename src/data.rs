//! Core data model shared by every stage of the pipeline: [`RawContent`],
//! [`ParsedContent`], [`Section`], and the output entity, [`Chunk`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A half-open character-offset span, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// What kind of source document a [`RawContent`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Pdf,
    Docx,
    Xlsx,
    Pptx,
    Markdown,
    PlainText,
    Html,
    Json,
    Csv,
    Zip,
    Unknown,
}

impl SourceType {
    /// Dispatch purely by file extension, matching the registry lookup
    /// described for the reader contract.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => SourceType::Pdf,
            "docx" => SourceType::Docx,
            "xlsx" => SourceType::Xlsx,
            "pptx" => SourceType::Pptx,
            "md" => SourceType::Markdown,
            "txt" => SourceType::PlainText,
            "html" | "htm" => SourceType::Html,
            "json" => SourceType::Json,
            "csv" => SourceType::Csv,
            "zip" => SourceType::Zip,
            _ => SourceType::Unknown,
        }
    }
}

/// Source-level metadata carried alongside extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHints {
    pub file_name: String,
    pub size_bytes: u64,
    pub source_type: SourceType,
    /// Page number -> character span, when the reader knows pages (PDF,
    /// DOCX, PPTX). `None` for formats without a page concept.
    pub page_ranges: Option<BTreeMap<u32, Span>>,
    pub base_language: Option<String>,
}

impl SourceHints {
    pub fn new(file_name: impl Into<String>, size_bytes: u64, source_type: SourceType) -> Self {
        Self {
            file_name: file_name.into(),
            size_bytes,
            source_type,
            page_ranges: None,
            base_language: None,
        }
    }

    /// Look up which page a character offset falls on, if page ranges are
    /// known for this source.
    pub fn page_for_offset(&self, offset: usize) -> Option<u32> {
        let ranges = self.page_ranges.as_ref()?;
        for (page, span) in ranges {
            if offset >= span.start && offset < span.end {
                return Some(*page);
            }
        }
        None
    }
}

/// Output of the Extract stage: unicode text plus whatever structural hints
/// the reader could infer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContent {
    pub text: String,
    pub hints: SourceHints,
}

/// A structural section of a document: a heading and everything nested
/// beneath it, as a contiguous character span.
///
/// Invariant: sibling spans are disjoint and sorted by start offset; a
/// parent's span covers the union of its children's spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub level: u8,
    pub char_span: Span,
    pub subsections: Vec<Section>,
}

impl Section {
    pub fn new(heading: impl Into<String>, level: u8, char_span: Span) -> Self {
        Self {
            heading: heading.into(),
            level: level.clamp(1, 6),
            char_span,
            subsections: Vec::new(),
        }
    }

    /// Flatten into a depth-first sequence of `(heading, level, span)`.
    pub fn flatten(&self) -> Vec<(&str, u8, Span)> {
        let mut out = vec![(self.heading.as_str(), self.level, self.char_span)];
        for child in &self.subsections {
            out.extend(child.flatten());
        }
        out
    }

    /// The heading path (root to leaf) for the innermost section containing
    /// `offset`, or an empty vec if `offset` falls outside every section.
    pub fn heading_path_for(&self, offset: usize) -> Vec<String> {
        if offset < self.char_span.start || offset >= self.char_span.end {
            return Vec::new();
        }
        let mut path = vec![self.heading.clone()];
        for child in &self.subsections {
            let child_path = child.heading_path_for(offset);
            if !child_path.is_empty() {
                path.extend(child_path);
                break;
            }
        }
        path
    }
}

/// Output of the Parse stage (and, unless Refine changes it, input to
/// Chunk). Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedContent {
    pub text: String,
    pub sections: Vec<Section>,
    pub hints: SourceHints,
    pub page_ranges: Option<BTreeMap<u32, Span>>,
}

impl ParsedContent {
    pub fn without_structure(text: String, hints: SourceHints) -> Self {
        let page_ranges = hints.page_ranges.clone();
        Self {
            text,
            sections: Vec::new(),
            hints,
            page_ranges,
        }
    }

    /// The heading path leading to `offset`, searching top-level sections in
    /// order (spec invariant: sections sorted by start offset).
    pub fn heading_path_for(&self, offset: usize) -> Vec<String> {
        for section in &self.sections {
            let path = section.heading_path_for(offset);
            if !path.is_empty() {
                return path;
            }
        }
        Vec::new()
    }

    pub fn page_for_offset(&self, offset: usize) -> Option<u32> {
        let ranges = self.page_ranges.as_ref()?;
        for (page, span) in ranges {
            if offset >= span.start && offset < span.end {
                return Some(*page);
            }
        }
        None
    }
}

/// Untyped but tagged values carried in [`Chunk::props`]. Reserved keys
/// (listed in the crate-level docs) have a known payload type; anything else
/// is free-form extension data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PropValue {
    Str(String),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<f64> for PropValue {
    fn from(f: f64) -> Self {
        PropValue::Float(f)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<Vec<String>> for PropValue {
    fn from(v: Vec<String>) -> Self {
        PropValue::List(v)
    }
}

/// Free-form, open-but-typed slot map attached to every chunk.
pub type PropMap = HashMap<String, PropValue>;

/// Reserved [`Chunk::props`] keys, documented in `spec.md` §6.
pub mod prop_keys {
    pub const DOCUMENT_TOPIC: &str = "DocumentTopic";
    pub const DOCUMENT_KEYWORDS: &str = "DocumentKeywords";
    pub const QUALITY_RELEVANCE_SCORE: &str = "QualityRelevanceScore";
    pub const QUALITY_COMPLETENESS: &str = "QualityCompleteness";
    pub const CONTENT_TYPE: &str = "ContentType";
    pub const STRUCTURAL_ROLE: &str = "StructuralRole";
    pub const ENRICHED_SUMMARY: &str = "EnrichedSummary";
    pub const ENRICHED_KEYWORDS: &str = "EnrichedKeywords";
    pub const ENRICHED_CONTEXTUAL_TEXT: &str = "EnrichedContextualText";
    pub const AUTO_SELECTED_STRATEGY: &str = "AutoSelectedStrategy";
    pub const SELECTION_REASONING: &str = "SelectionReasoning";
    pub const SELECTION_CONFIDENCE: &str = "SelectionConfidence";
    pub const MEMORY_OPTIMIZED: &str = "MemoryOptimized";
}

/// A chunk's structural role, written into `props[StructuralRole]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralRole {
    Header,
    Table,
    CodeBlock,
    List,
    Content,
}

impl StructuralRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralRole::Header => "header",
            StructuralRole::Table => "table",
            StructuralRole::CodeBlock => "code_block",
            StructuralRole::List => "list",
            StructuralRole::Content => "content",
        }
    }
}

/// Positional metadata for a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkLocation {
    pub start_char: usize,
    pub end_char: usize,
    pub heading_path: Vec<String>,
    pub page_number: Option<u32>,
}

/// The pipeline's output entity: a bounded substring of a document plus
/// metadata, intended as a retrieval unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub index: usize,
    pub content: String,
    pub strategy_name: String,
    pub location: ChunkLocation,
    pub estimated_tokens: usize,
    pub context_dependency: f32,
    pub props: PropMap,
}

impl Chunk {
    pub fn new(
        index: usize,
        content: String,
        strategy_name: impl Into<String>,
        start_char: usize,
        end_char: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            content,
            strategy_name: strategy_name.into(),
            location: ChunkLocation {
                start_char,
                end_char,
                heading_path: Vec::new(),
                page_number: None,
            },
            estimated_tokens: 0,
            context_dependency: 0.0,
            props: PropMap::new(),
        }
    }

    pub fn set_prop(&mut self, key: &str, value: impl Into<PropValue>) {
        self.props.insert(key.to_string(), value.into());
    }

    pub fn structural_role(&self) -> Option<StructuralRole> {
        match self.props.get(prop_keys::STRUCTURAL_ROLE)?.as_str()? {
            "header" => Some(StructuralRole::Header),
            "table" => Some(StructuralRole::Table),
            "code_block" => Some(StructuralRole::CodeBlock),
            "list" => Some(StructuralRole::List),
            "content" => Some(StructuralRole::Content),
            _ => None,
        }
    }
}

/// Recognised `ChunkingOptions.custom` schema tags for
/// `enableMetadataEnrichment`'s companion `metadataSchema` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSchema {
    General,
    Academic,
    Technical,
    Legal,
    Medical,
}

/// Options controlling how a document is chunked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingOptions {
    /// Strategy name, or `"Auto"`.
    pub strategy: String,
    pub max_chunk_size: usize,
    pub overlap_size: usize,
    pub custom: HashMap<String, serde_json::Value>,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            strategy: "Auto".to_string(),
            max_chunk_size: 512,
            overlap_size: 64,
            custom: HashMap::new(),
        }
    }
}

impl ChunkingOptions {
    pub fn enable_metadata_enrichment(&self) -> bool {
        self.custom
            .get("enableMetadataEnrichment")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn metadata_schema(&self) -> MetadataSchema {
        self.custom
            .get("metadataSchema")
            .and_then(|v| v.as_str())
            .and_then(|s| match s {
                "academic" => Some(MetadataSchema::Academic),
                "technical" => Some(MetadataSchema::Technical),
                "legal" => Some(MetadataSchema::Legal),
                "medical" => Some(MetadataSchema::Medical),
                "general" => Some(MetadataSchema::General),
                _ => None,
            })
            .unwrap_or(MetadataSchema::General)
    }

    pub fn force_strategy(&self) -> Option<String> {
        self.custom
            .get("ForceStrategy")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    pub fn confidence_threshold(&self) -> Option<f32> {
        self.custom
            .get("ConfidenceThreshold")
            .and_then(|v| v.as_f64())
            .map(|f| f as f32)
    }

    pub fn prefer_speed(&self) -> bool {
        self.custom
            .get("PreferSpeed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn prefer_quality(&self) -> bool {
        self.custom
            .get("PreferQuality")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn max_analysis_time(&self) -> Option<std::time::Duration> {
        self.custom
            .get("MaxAnalysisTime")
            .and_then(|v| v.as_f64())
            .map(std::time::Duration::from_secs_f64)
    }

    /// The 1.5x-style safety ceiling a strategy must never exceed, per
    /// `SPEC_FULL.md` §12 item 1. Defaults to 1.5, overridable via
    /// `custom["SafetyFactor"]`.
    pub fn safety_factor(&self) -> f32 {
        self.custom
            .get("SafetyFactor")
            .and_then(|v| v.as_f64())
            .map(|f| f as f32)
            .unwrap_or(1.5)
    }

    pub fn hard_ceiling(&self) -> usize {
        ((self.max_chunk_size as f32) * self.safety_factor()).ceil() as usize
    }
}

/// Content type classification used by [`DocumentCharacteristics`] and the
/// strategy selector's rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Narrative,
    Technical,
    Structured,
    Tabular,
    Mixed,
}

/// Domain classification, reused by both the selector and the Intelligent
/// strategy's per-chunk enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Legal,
    Medical,
    Technical,
    Business,
    Academic,
    General,
}

/// A feature vector describing a document sample, used by the adaptive
/// strategy selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCharacteristics {
    pub extension: String,
    pub has_headers: bool,
    pub has_code_blocks: bool,
    pub has_tables: bool,
    pub has_lists: bool,
    pub has_math: bool,
    pub has_numbered_sections: bool,
    pub has_structured_requirements: bool,
    pub content_type: ContentType,
    pub language: String,
    pub domain: Domain,
    pub avg_sentence_length: f32,
    pub paragraph_count: usize,
    pub structure_complexity: f32,
}

/// Refining (cleanup) policies applied between Parse and Chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefiningOptions {
    pub remove_headers_footers: bool,
    pub remove_page_numbers: bool,
    pub clean_whitespace: bool,
    pub restructure_headings: bool,
    pub convert_to_markdown: bool,
    pub preset: Option<RefiningPreset>,
}

impl Default for RefiningOptions {
    fn default() -> Self {
        Self {
            remove_headers_footers: false,
            remove_page_numbers: false,
            clean_whitespace: true,
            restructure_headings: false,
            convert_to_markdown: false,
            preset: None,
        }
    }
}

/// Named refining presets recognised by Refine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefiningPreset {
    Light,
    Standard,
    ForKorean,
    ForWebContent,
    ForPdfContent,
    ForRag,
    ForKoreanWebContent,
}

impl RefiningOptions {
    /// Apply a named preset on top of the current options, mirroring the
    /// tag table in `spec.md` §6.
    pub fn with_preset(mut self, preset: RefiningPreset) -> Self {
        self.preset = Some(preset);
        match preset {
            RefiningPreset::Light => {
                self.clean_whitespace = true;
            }
            RefiningPreset::Standard => {
                self.clean_whitespace = true;
                self.remove_page_numbers = true;
            }
            RefiningPreset::ForKorean | RefiningPreset::ForKoreanWebContent => {
                self.clean_whitespace = true;
                self.remove_headers_footers = true;
            }
            RefiningPreset::ForWebContent => {
                self.clean_whitespace = true;
                self.remove_headers_footers = true;
                self.convert_to_markdown = true;
            }
            RefiningPreset::ForPdfContent => {
                self.clean_whitespace = true;
                self.remove_headers_footers = true;
                self.remove_page_numbers = true;
            }
            RefiningPreset::ForRag => {
                self.clean_whitespace = true;
                self.remove_headers_footers = true;
                self.remove_page_numbers = true;
                self.restructure_headings = true;
            }
        }
        self
    }
}
