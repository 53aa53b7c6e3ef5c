//! Pluggable document readers, dispatched by file extension.
//!
//! Every reader turns a file on disk into [`RawContent`]: unicode text plus
//! the metadata the rest of the pipeline needs (file name, size, source
//! type). Binary formats (PDF/DOCX/XLSX/PPTX/ZIP) are registered but
//! opaque: without the `readers` feature they report
//! [`PipelineError::ServiceUnavailable`] rather than silently returning
//! empty text, so a caller can tell "no parser for this format" apart from
//! "empty document".

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::data::{RawContent, SourceHints, SourceType};
use crate::error::{PipelineError, PipelineResult};

/// Cooperative cancellation handle threaded through every long-running
/// stage. Checked between units of work, never pre-empting mid-operation.
pub type CancelToken = CancellationToken;

#[async_trait]
pub trait Reader: Send + Sync {
    fn can_read(&self, path: &Path) -> bool;

    async fn extract(&self, path: &Path, cancel: &CancelToken) -> PipelineResult<RawContent>;
}

/// Looks up a [`Reader`] by file extension.
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn Reader>>,
}

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "xlsx", "pptx", "md", "txt", "html", "htm", "json", "csv", "zip",
];

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every supported extension mapped. Text-family
    /// formats are fully functional; the binary formats are registered but
    /// opaque (`ServiceUnavailable`) unless the `readers` feature wires in
    /// a real implementation.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(&["txt"], Arc::new(PlainTextReader));
        registry.register(&["md"], Arc::new(MarkdownReader));
        registry.register(&["html", "htm"], Arc::new(HtmlReader));
        registry.register(&["json"], Arc::new(JsonReader));
        registry.register(&["csv"], Arc::new(CsvReader));
        for ext in ["pdf", "docx", "xlsx", "pptx", "zip"] {
            registry.register(&[ext], Arc::new(OpaqueBinaryReader { extension: ext.to_string() }));
        }
        registry
    }

    pub fn register(&mut self, extensions: &[&str], reader: Arc<dyn Reader>) {
        for ext in extensions {
            self.readers.insert(ext.to_string(), reader.clone());
        }
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn Reader>> {
        self.readers.get(&extension.to_lowercase()).cloned()
    }

    pub fn supported_extensions() -> &'static [&'static str] {
        SUPPORTED_EXTENSIONS
    }

    pub async fn extract(&self, path: &Path, cancel: &CancelToken) -> PipelineResult<RawContent> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .ok_or_else(|| PipelineError::InvalidInput(format!("no file extension: {}", path.display())))?;

        let reader = self
            .get(&extension)
            .ok_or_else(|| PipelineError::InvalidInput(format!("unsupported extension: .{extension}")))?;

        reader.extract(path, cancel).await
    }
}

fn hints_for(path: &Path, text_len: usize) -> SourceHints {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown").to_string();
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    SourceHints::new(file_name, text_len as u64, SourceType::from_extension(extension))
}

async fn read_to_string(path: &Path) -> PipelineResult<String> {
    tokio::fs::read_to_string(path).await.map_err(PipelineError::from)
}

struct PlainTextReader;

#[async_trait]
impl Reader for PlainTextReader {
    fn can_read(&self, path: &Path) -> bool {
        matches!(path.extension().and_then(|e| e.to_str()), Some("txt"))
    }

    async fn extract(&self, path: &Path, _cancel: &CancelToken) -> PipelineResult<RawContent> {
        let text = read_to_string(path).await?;
        let hints = hints_for(path, text.len());
        Ok(RawContent { text, hints })
    }
}

struct MarkdownReader;

#[async_trait]
impl Reader for MarkdownReader {
    fn can_read(&self, path: &Path) -> bool {
        matches!(path.extension().and_then(|e| e.to_str()), Some("md"))
    }

    async fn extract(&self, path: &Path, _cancel: &CancelToken) -> PipelineResult<RawContent> {
        let text = read_to_string(path).await?;
        let hints = hints_for(path, text.len());
        Ok(RawContent { text, hints })
    }
}

struct HtmlReader;

#[async_trait]
impl Reader for HtmlReader {
    fn can_read(&self, path: &Path) -> bool {
        matches!(path.extension().and_then(|e| e.to_str()), Some("html") | Some("htm"))
    }

    async fn extract(&self, path: &Path, _cancel: &CancelToken) -> PipelineResult<RawContent> {
        let raw = read_to_string(path).await?;
        let text = strip_html_tags(&raw);
        let hints = hints_for(path, text.len());
        Ok(RawContent { text, hints })
    }
}

/// Strips tags with a single forward scan; not a full HTML parser (no
/// entity decoding, no script/style suppression) but sufficient to get
/// readable text out of simple documents without pulling in a DOM crate.
fn strip_html_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

struct JsonReader;

#[async_trait]
impl Reader for JsonReader {
    fn can_read(&self, path: &Path) -> bool {
        matches!(path.extension().and_then(|e| e.to_str()), Some("json"))
    }

    async fn extract(&self, path: &Path, _cancel: &CancelToken) -> PipelineResult<RawContent> {
        let raw = read_to_string(path).await?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let text = flatten_json(&value);
        let hints = hints_for(path, text.len());
        Ok(RawContent { text, hints })
    }
}

/// Flattens arbitrary JSON into readable text: object keys become
/// pseudo-headers, arrays and scalars are emitted line by line.
fn flatten_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    flatten_json_into(value, 0, &mut out);
    out
}

fn flatten_json_into(value: &serde_json::Value, depth: usize, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                out.push_str(&"#".repeat((depth + 1).min(6)));
                out.push(' ');
                out.push_str(key);
                out.push('\n');
                flatten_json_into(val, depth + 1, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_json_into(item, depth, out);
            }
        }
        serde_json::Value::String(s) => {
            out.push_str(s);
            out.push('\n');
        }
        other => {
            out.push_str(&other.to_string());
            out.push('\n');
        }
    }
}

struct CsvReader;

#[async_trait]
impl Reader for CsvReader {
    fn can_read(&self, path: &Path) -> bool {
        matches!(path.extension().and_then(|e| e.to_str()), Some("csv"))
    }

    async fn extract(&self, path: &Path, _cancel: &CancelToken) -> PipelineResult<RawContent> {
        let raw = read_to_string(path).await?;
        let text = csv_to_markdown_table(&raw);
        let hints = hints_for(path, text.len());
        Ok(RawContent { text, hints })
    }
}

/// Renders CSV as a markdown table so downstream table-aware strategies
/// (Intelligent) recognise it without a dedicated CSV code path.
fn csv_to_markdown_table(raw: &str) -> String {
    let mut lines = raw.lines();
    let Some(header) = lines.next() else {
        return String::new();
    };
    let columns: Vec<&str> = header.split(',').collect();
    let mut out = format!("| {} |\n", columns.join(" | "));
    out.push_str(&format!("| {} |\n", columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")));
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split(',').collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

/// Registered for the extension but not actually decoded without the
/// `readers` feature wiring in a real PDF/Office/zip parser; this is the
/// explicit "opaque" behavior `spec.md` §4.1 calls for rather than
/// returning an empty document silently.
struct OpaqueBinaryReader {
    extension: String,
}

#[async_trait]
impl Reader for OpaqueBinaryReader {
    fn can_read(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case(&self.extension)).unwrap_or(false)
    }

    async fn extract(&self, _path: &Path, _cancel: &CancelToken) -> PipelineResult<RawContent> {
        Err(PipelineError::ServiceUnavailable(format!(
            "no .{} parser is compiled in; enable the `readers` feature or register a custom Reader",
            self.extension
        )))
    }
}
