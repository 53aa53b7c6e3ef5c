//! Error taxonomy for the pipeline.
//!
//! Library code returns [`PipelineResult`]; only the CLI binary widens these
//! into `anyhow::Result` for top-level context chaining.

use std::fmt;

/// Which stage of the four(-plus-one) stage pipeline raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StageKind {
    Extract,
    Parse,
    Refine,
    Chunk,
    Enrich,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Extract => "extract",
            StageKind::Parse => "parse",
            StageKind::Refine => "refine",
            StageKind::Chunk => "chunk",
            StageKind::Enrich => "enrich",
        };
        f.write_str(name)
    }
}

/// A resource policy limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLimit {
    ArchiveFileSize,
    ArchiveExtractedSize,
    ArchiveFileCount,
    ArchiveCompressionRatio,
    CacheBudget,
    MaxAnalysisTime,
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceLimit::ArchiveFileSize => "archive file size",
            ResourceLimit::ArchiveExtractedSize => "archive extracted size",
            ResourceLimit::ArchiveFileCount => "archive file count",
            ResourceLimit::ArchiveCompressionRatio => "archive compression ratio",
            ResourceLimit::CacheBudget => "cache budget",
            ResourceLimit::MaxAnalysisTime => "max analysis time",
        };
        f.write_str(name)
    }
}

/// The full pipeline error taxonomy. No language-runtime-specific exception
/// types leak through this boundary; every suspendable operation returns
/// `PipelineResult<T>`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing file, unknown extension, malformed options. Fatal, surfaced
    /// immediately without any fallback.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An error attributable to a specific stage. Only `Enrich` errors are
    /// ever retried by a caller; all other stage failures follow the
    /// propagation policy in the stage implementation itself.
    #[error("{kind} stage failed: {cause}")]
    Stage {
        kind: StageKind,
        #[source]
        cause: Box<PipelineError>,
    },

    /// An LLM or vision collaborator was absent or timed out. Never fatal;
    /// every call site degrades to a rule-based or deterministic path.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A configured resource policy was exceeded.
    #[error("resource exceeded ({limit}): {detail}")]
    ResourceExceeded {
        limit: ResourceLimit,
        detail: String,
    },

    /// Cooperative cancellation. Never logged as a failure by callers.
    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn stage(kind: StageKind, cause: PipelineError) -> Self {
        PipelineError::Stage {
            kind,
            cause: Box::new(cause),
        }
    }

    /// True for errors that must never be written into the cache or treated
    /// as a run-ending failure by a caller that only wants to log and move
    /// on (used by the orchestrator's cache-error-swallowing policy).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    pub fn stage_kind(&self) -> Option<StageKind> {
        match self {
            PipelineError::Stage { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
