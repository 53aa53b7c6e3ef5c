//! The chunking strategy family: a common [`ChunkingStrategy`] trait plus
//! the concrete splitters, the adaptive selector, and the `Auto` façade.

pub mod auto;
pub mod fixed;
pub mod helper;
pub mod intelligent;
pub mod memory_optimized;
pub mod paragraph;
pub mod selector;
pub mod semantic;
pub mod smart;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::data::{Chunk, ChunkingOptions, Domain, ParsedContent};
use crate::error::PipelineResult;
use crate::services::{ImageToTextService, TextCompletionService};

/// A pluggable chunk-cutting algorithm. Strategies borrow `ParsedContent`
/// read-only and own their own scratch state; none of them mutate shared
/// state directly (the cache and services are the only shared
/// collaborators, passed in by reference).
#[async_trait]
pub trait ChunkingStrategy: Send + Sync {
    /// The strategy's registry name, also written into
    /// `Chunk::strategy_name` (wrapped in `Auto(...)` when selected by
    /// [`auto::AutoStrategy`]).
    fn name(&self) -> &'static str;

    async fn chunk(
        &self,
        parsed: &ParsedContent,
        options: &ChunkingOptions,
    ) -> PipelineResult<Vec<Chunk>>;
}

/// Looks strategies up by name, including the synthetic `"Auto"` entry.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn ChunkingStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// A registry pre-populated with every built-in strategy, matching
    /// `spec.md`'s component table. `Auto` is registered separately by the
    /// orchestrator once the registry (and optional LLM) are known, since
    /// `AutoStrategy` needs to see its siblings.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(fixed::FixedSizeStrategy::new()));
        registry.register(Arc::new(paragraph::ParagraphStrategy::new()));
        registry.register(Arc::new(semantic::SemanticStrategy::new()));
        registry.register(Arc::new(smart::SmartStrategy::new()));
        registry.register(Arc::new(intelligent::IntelligentStrategy::new()));
        registry.register(Arc::new(memory_optimized::MemoryOptimizedIntelligent::new()));
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn ChunkingStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChunkingStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }
}

/// Optional collaborators a strategy (or the selector) may consult, always
/// behind graceful-degradation: absence is never fatal.
#[derive(Clone, Default)]
pub struct StrategyServices {
    pub llm: Option<Arc<dyn TextCompletionService>>,
    pub vision: Option<Arc<dyn ImageToTextService>>,
}

// --- Shared enrichment vocabulary, used by IntelligentStrategy's per-chunk
// enrichment and by the selector's document-characteristics pass. ---

static API_RE: Lazy<Regex> = Lazy::new(|| word_re(&["api", "endpoint", "rest", "graphql", "webhook", "grpc"]));
static DATABASE_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["database", "sql", "query", "schema", "table", "index", "postgres", "mysql"]));
static FRONTEND_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["component", "react", "vue", "css", "dom", "ui", "render", "browser"]));
static BACKEND_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["server", "service", "handler", "middleware", "controller", "backend"]));
static DEVOPS_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["docker", "kubernetes", "ci", "cd", "pipeline", "deploy", "terraform", "helm"]));
static AIML_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["model", "embedding", "token", "inference", "llm", "neural", "training", "dataset"]));

fn word_re(words: &[&str]) -> Regex {
    let pattern = format!(r"(?i)\b({})\b", words.join("|"));
    Regex::new(&pattern).unwrap()
}

/// Technical keyword categories, each reported only if it has at least one
/// whole-word match.
pub fn technical_keyword_categories(text: &str) -> Vec<String> {
    let mut categories = Vec::new();
    for (re, label) in [
        (&*API_RE, "API"),
        (&*DATABASE_RE, "Database"),
        (&*FRONTEND_RE, "Frontend"),
        (&*BACKEND_RE, "Backend"),
        (&*DEVOPS_RE, "DevOps"),
        (&*AIML_RE, "AI/ML"),
    ] {
        if re.is_match(text) {
            categories.push(label.to_string());
        }
    }
    categories
}

static LEGAL_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["plaintiff", "defendant", "statute", "whereas", "jurisdiction", "hereinafter", "contract"]));
static MEDICAL_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["patient", "diagnosis", "treatment", "symptom", "dosage", "clinical", "prescribed"]));
static ACADEMIC_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["abstract", "hypothesis", "methodology", "citation", "literature", "references"]));
static BUSINESS_RE: Lazy<Regex> =
    Lazy::new(|| word_re(&["revenue", "stakeholder", "quarterly", "budget", "roadmap", "kpi", "invoice"]));

/// Classify a document's domain from whole-word keyword matches, used by
/// both the selector's `DocumentCharacteristics` and the Intelligent
/// strategy's per-chunk enrichment.
pub fn classify_domain(text: &str) -> Domain {
    let scores = [
        (Domain::Legal, LEGAL_RE.find_iter(text).count()),
        (Domain::Medical, MEDICAL_RE.find_iter(text).count()),
        (Domain::Academic, ACADEMIC_RE.find_iter(text).count()),
        (Domain::Business, BUSINESS_RE.find_iter(text).count()),
        (
            Domain::Technical,
            technical_keyword_categories(text).len(),
        ),
    ];
    scores
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count > 0)
        .map(|(domain, _)| domain)
        .unwrap_or(Domain::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_with_builtins_has_every_strategy() {
        let registry = StrategyRegistry::with_builtins();
        for name in ["FixedSize", "Paragraph", "Semantic", "Smart", "Intelligent", "MemoryOptimizedIntelligent"] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn technical_keywords_detect_categories() {
        let cats = technical_keyword_categories("Our REST API talks to a Postgres database via a Kubernetes deploy");
        assert!(cats.contains(&"API".to_string()));
        assert!(cats.contains(&"Database".to_string()));
        assert!(cats.contains(&"DevOps".to_string()));
    }

    #[test]
    fn classify_domain_detects_legal() {
        let domain = classify_domain("The plaintiff and defendant entered into a contract, whereas the statute applies.");
        assert_eq!(domain, Domain::Legal);
    }
}
