//! Feature-detects a document and picks the best chunking strategy for it:
//! rule-based by default, optionally consulting an LLM first.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::chunking::{classify_domain, StrategyRegistry, StrategyServices};
use crate::data::{ChunkingOptions, ContentType, Domain, DocumentCharacteristics, ParsedContent};
use crate::overlap::split_sentences;

const SAMPLE_LEN: usize = 2000;

static HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+\S").unwrap());
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*```").unwrap());
static TABLE_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^.*\|.*\|.*$").unwrap());
static LIST_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*([-*+]|\d+[.)])\s+\S").unwrap());
static MATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[^$]+\$|\\\[|\\\(").unwrap());
static NUMBERED_SECTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+(\.\d+)*\s+\S").unwrap());
static REQUIREMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(shall|must|requirement|REQ-\d+)\b").unwrap());

/// One strategy's selection rationale, alongside the final pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCandidate {
    pub name: String,
    pub confidence: f32,
    pub reasoning: String,
}

/// The selector's full verdict: `spec.md` §4.2's output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub strategy_name: String,
    pub confidence: f32,
    pub reasoning: String,
    pub used_llm: bool,
    pub alternatives: Vec<StrategyCandidate>,
}

#[derive(Debug, Deserialize)]
struct LlmSelection {
    strategy_name: String,
    confidence: f32,
    reasoning: String,
}

/// Computes [`DocumentCharacteristics`] and, from them, the single best
/// registered strategy, with LLM assistance consulted first when
/// available and falling back to rules on any failure.
#[derive(Debug, Default, Clone)]
pub struct AdaptiveStrategySelector;

impl AdaptiveStrategySelector {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, parsed: &ParsedContent) -> DocumentCharacteristics {
        let sample: String = parsed.text.chars().take(SAMPLE_LEN).collect();
        let extension = parsed
            .hints
            .file_name
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_lowercase();

        let has_headers = HEADER_RE.is_match(&sample);
        let has_code_blocks = CODE_FENCE_RE.is_match(&sample);
        let has_tables = TABLE_ROW_RE.find_iter(&sample).count() >= 2;
        let has_lists = LIST_ITEM_RE.is_match(&sample);
        let has_math = MATH_RE.is_match(&sample);
        let has_numbered_sections = NUMBERED_SECTION_RE.is_match(&sample);
        let has_structured_requirements = REQUIREMENT_RE.is_match(&sample);

        let sentences = split_sentences(&sample);
        let avg_sentence_length = if sentences.is_empty() {
            0.0
        } else {
            sentences.iter().map(|s| s.split_whitespace().count()).sum::<usize>() as f32 / sentences.len() as f32
        };
        let paragraph_count = sample.split("\n\n").filter(|p| !p.trim().is_empty()).count();

        let content_type = if has_tables && has_numbered_sections {
            ContentType::Mixed
        } else if has_tables {
            ContentType::Tabular
        } else if has_code_blocks || has_headers {
            ContentType::Technical
        } else if has_numbered_sections || has_lists {
            ContentType::Structured
        } else {
            ContentType::Narrative
        };

        let domain = classify_domain(&sample);
        let language = crate::language_detector::LanguageDetector::new().detect(&sample).0;

        let mut complexity = 0.0f32;
        if has_headers {
            complexity += 2.0;
        }
        if has_code_blocks {
            complexity += 2.0;
        }
        if has_tables {
            complexity += 2.0;
        }
        if has_lists {
            complexity += 1.0;
        }
        if has_numbered_sections {
            complexity += 1.5;
        }
        if has_structured_requirements {
            complexity += 1.5;
        }
        let structure_complexity = complexity.min(10.0);

        DocumentCharacteristics {
            extension,
            has_headers,
            has_code_blocks,
            has_tables,
            has_lists,
            has_math,
            has_numbered_sections,
            has_structured_requirements,
            content_type,
            language,
            domain,
            avg_sentence_length,
            paragraph_count,
            structure_complexity,
        }
    }

    /// Rule-based fallback ladder, per `spec.md` §4.2 step 4.
    fn rule_based(&self, c: &DocumentCharacteristics) -> (String, f32, String) {
        if c.has_numbered_sections || c.has_structured_requirements {
            return ("Smart".into(), 0.95, "numbered sections or structured requirements present".into());
        }
        if c.has_code_blocks && c.has_headers {
            return ("Intelligent".into(), 0.85, "code blocks alongside markdown headers".into());
        }
        if matches!(c.domain, Domain::Legal | Domain::Medical) {
            return ("Smart".into(), 0.9, format!("domain classified as {:?}", c.domain));
        }
        if matches!(c.content_type, ContentType::Narrative) || c.avg_sentence_length > 20.0 {
            return ("Semantic".into(), 0.8, "narrative content or long average sentence length".into());
        }
        if c.structure_complexity < 3.0 {
            return ("Paragraph".into(), 0.75, "low structural complexity".into());
        }
        ("Smart".into(), 0.7, "default fallback".into())
    }

    /// Hard overrides applied after the initial pick, per `spec.md` §4.2
    /// step 5.
    fn apply_overrides(
        &self,
        mut name: String,
        mut confidence: f32,
        mut reasoning: String,
        c: &DocumentCharacteristics,
        options: &ChunkingOptions,
        registry: &StrategyRegistry,
        memory_constrained: bool,
    ) -> (String, f32, String) {
        if c.extension == "pdf" && c.has_tables {
            name = "Intelligent".into();
            confidence = 0.95;
            reasoning = "PDF with tables forces Intelligent".into();
        } else if name == "Smart" && reasoning == "default fallback" {
            if let Some(ext_pick) = extension_table(&c.extension, memory_constrained) {
                name = ext_pick.to_string();
                reasoning = format!("extension .{} maps to {}", c.extension, ext_pick);
            }
        }

        if options.prefer_speed() {
            if let Some(fast) = pick_from_order(&["FixedSize", "Paragraph", "Semantic", "Intelligent", "Smart"], registry) {
                name = fast;
                reasoning = "PreferSpeed selected the fastest available candidate".into();
            }
        } else if options.prefer_quality() {
            if let Some(slow) = pick_from_order(&["Smart", "Intelligent", "Semantic", "Paragraph", "FixedSize"], registry) {
                name = slow;
                reasoning = "PreferQuality selected the highest-fidelity candidate".into();
            }
        }

        (name, confidence, reasoning)
    }

    /// Select a strategy for `parsed`, consulting an LLM first when one is
    /// configured and `MaxAnalysisTime` allows it, then falling back to
    /// rules. The result always names a strategy registered in `registry`
    /// (downgrading to `Smart` otherwise).
    pub async fn select(
        &self,
        parsed: &ParsedContent,
        options: &ChunkingOptions,
        registry: &StrategyRegistry,
        services: &StrategyServices,
        memory_constrained: bool,
    ) -> SelectionResult {
        let characteristics = self.analyze(parsed);

        let mut used_llm = false;
        let (mut name, mut confidence, mut reasoning) =
            if let Some(llm_pick) = self.try_llm(&characteristics, registry, services, options).await {
                used_llm = true;
                llm_pick
            } else {
                self.rule_based(&characteristics)
            };

        let (n, c, r) =
            self.apply_overrides(name, confidence, reasoning, &characteristics, options, registry, memory_constrained);
        name = n;
        confidence = c;
        reasoning = r;

        if !registry.contains(&name) {
            name = "Smart".to_string();
            confidence *= 0.8;
            reasoning = format!("{reasoning}; downgraded to Smart (requested strategy unregistered)");
        }

        let alternatives = registry
            .names()
            .into_iter()
            .filter(|n| n != &name)
            .map(|n| StrategyCandidate {
                name: n,
                confidence: 0.4,
                reasoning: "not selected".to_string(),
            })
            .collect();

        SelectionResult {
            strategy_name: name,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
            used_llm,
            alternatives,
        }
    }

    async fn try_llm(
        &self,
        characteristics: &DocumentCharacteristics,
        registry: &StrategyRegistry,
        services: &StrategyServices,
        options: &ChunkingOptions,
    ) -> Option<(String, f32, String)> {
        let llm = services.llm.as_ref()?;
        if let Some(limit) = options.max_analysis_time() {
            if limit.is_zero() {
                return None;
            }
        }

        let candidates = registry.names().join(", ");
        let prompt = format!(
            "Document characteristics: {:?}\nCandidate strategies: {}\nRespond with JSON {{\"strategy_name\":...,\"confidence\":...,\"reasoning\":...}}.",
            characteristics, candidates
        );

        let raw = llm.complete(&prompt).await.ok()?;
        let parsed: LlmSelection = serde_json::from_str(&raw).ok()?;
        Some((parsed.strategy_name, parsed.confidence.clamp(0.0, 1.0), parsed.reasoning))
    }
}

fn extension_table(extension: &str, memory_constrained: bool) -> Option<&'static str> {
    match extension {
        "pdf" => Some("Semantic"),
        "docx" | "xls" | "xlsx" | "ppt" | "pptx" => {
            Some(if memory_constrained { "MemoryOptimizedIntelligent" } else { "Intelligent" })
        }
        "md" | "txt" => Some("Semantic"),
        "html" | "htm" => Some("Semantic"),
        "json" => Some("Smart"),
        "csv" => Some("FixedSize"),
        _ => None,
    }
}

/// Picks the leftmost name in `order` that is actually present in
/// `registry`, per `spec.md` §4.2 step 5 ("leftmost of […] present in
/// candidates"). Returns `None` when nothing in `order` is registered.
fn pick_from_order(order: &[&str], registry: &StrategyRegistry) -> Option<String> {
    let registered: HashSet<String> = registry.names().into_iter().collect();
    order.iter().find(|n| registered.contains(**n)).map(|n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SourceHints, SourceType};

    fn parsed(text: &str, name: &str) -> ParsedContent {
        ParsedContent::without_structure(text.to_string(), SourceHints::new(name, text.len() as u64, SourceType::Markdown))
    }

    #[tokio::test]
    async fn numbered_sections_pick_smart() {
        let text = "1. First requirement\n2. Second requirement\nThe system shall comply with REQ-001.";
        let selector = AdaptiveStrategySelector::new();
        let registry = StrategyRegistry::with_builtins();
        let result = selector
            .select(&parsed(text, "doc.txt"), &ChunkingOptions::default(), &registry, &StrategyServices::default(), false)
            .await;
        assert_eq!(result.strategy_name, "Smart");
        assert!(result.confidence >= 0.9);
    }

    #[tokio::test]
    async fn pdf_with_tables_forces_intelligent() {
        let text = "| A | B |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |";
        let selector = AdaptiveStrategySelector::new();
        let registry = StrategyRegistry::with_builtins();
        let result = selector
            .select(&parsed(text, "report.pdf"), &ChunkingOptions::default(), &registry, &StrategyServices::default(), false)
            .await;
        assert_eq!(result.strategy_name, "Intelligent");
    }

    #[tokio::test]
    async fn legal_domain_is_not_overridden_by_the_extension_table() {
        let text = "This agreement constitutes a binding contract between the parties hereto, \
            and the undersigned attorney certifies compliance with the governing statute.";
        let selector = AdaptiveStrategySelector::new();
        let registry = StrategyRegistry::with_builtins();
        let result = selector
            .select(&parsed(text, "contract.txt"), &ChunkingOptions::default(), &registry, &StrategyServices::default(), false)
            .await;
        assert_eq!(result.strategy_name, "Smart");
        assert!(result.confidence >= 0.85, "legal-domain pick should keep its 0.9 confidence, got {}", result.confidence);
    }

    #[test]
    fn prefer_speed_only_picks_a_registered_strategy() {
        let mut registry = StrategyRegistry::new();
        registry.register(std::sync::Arc::new(crate::chunking::semantic::SemanticStrategy::new()));
        registry.register(std::sync::Arc::new(crate::chunking::smart::SmartStrategy::new()));

        let pick = pick_from_order(&["FixedSize", "Paragraph", "Semantic", "Intelligent", "Smart"], &registry);
        assert_eq!(pick.as_deref(), Some("Semantic"));
    }

    #[tokio::test]
    async fn unregistered_strategy_downgrades_to_smart() {
        let selector = AdaptiveStrategySelector::new();
        let mut registry = StrategyRegistry::new();
        registry.register(std::sync::Arc::new(crate::chunking::smart::SmartStrategy::new()));
        let text = "Just a narrative paragraph with no structure at all, written in plain prose.";
        let result = selector
            .select(&parsed(text, "doc.txt"), &ChunkingOptions::default(), &registry, &StrategyServices::default(), false)
            .await;
        assert_eq!(result.strategy_name, "Smart");
    }
}
