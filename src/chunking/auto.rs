//! Façade strategy: runs [`AdaptiveStrategySelector`] then delegates to the
//! chosen strategy, recording the selection on every emitted chunk.

use async_trait::async_trait;

use crate::chunking::selector::AdaptiveStrategySelector;
use crate::chunking::{ChunkingStrategy, StrategyRegistry, StrategyServices};
use crate::data::{prop_keys, Chunk, ChunkingOptions, ParsedContent};
use crate::error::{PipelineError, PipelineResult};

#[derive(Clone)]
pub struct AutoStrategy {
    registry: StrategyRegistry,
    services: StrategyServices,
    selector: AdaptiveStrategySelector,
    memory_constrained: bool,
}

impl AutoStrategy {
    pub fn new(registry: StrategyRegistry, services: StrategyServices, memory_constrained: bool) -> Self {
        Self {
            registry,
            services,
            selector: AdaptiveStrategySelector::new(),
            memory_constrained,
        }
    }
}

#[async_trait]
impl ChunkingStrategy for AutoStrategy {
    fn name(&self) -> &'static str {
        "Auto"
    }

    async fn chunk(&self, parsed: &ParsedContent, options: &ChunkingOptions) -> PipelineResult<Vec<Chunk>> {
        let forced = options.force_strategy();
        let selection = if let Some(name) = &forced {
            crate::logging::report_progress(crate::logging::ProgressEvent::Debug {
                operation: "auto_strategy_forced".to_string(),
                details: name.clone(),
            });
            crate::chunking::selector::SelectionResult {
                strategy_name: name.clone(),
                confidence: 1.0,
                reasoning: "ForceStrategy option set".to_string(),
                used_llm: false,
                alternatives: Vec::new(),
            }
        } else {
            self.selector
                .select(parsed, options, &self.registry, &self.services, self.memory_constrained)
                .await
        };

        let inner = self.registry.get(&selection.strategy_name).ok_or_else(|| {
            PipelineError::InvalidInput(format!("selector chose unregistered strategy {}", selection.strategy_name))
        })?;

        crate::logging::report_progress(crate::logging::ProgressEvent::StrategySelected {
            strategy_name: selection.strategy_name.clone(),
            confidence: selection.confidence,
            used_llm: selection.used_llm,
        });

        let mut chunks = inner.chunk(parsed, options).await?;
        for chunk in &mut chunks {
            chunk.strategy_name = format!("Auto({})", inner.name());
            chunk.set_prop(prop_keys::AUTO_SELECTED_STRATEGY, inner.name());
            chunk.set_prop(prop_keys::SELECTION_REASONING, selection.reasoning.clone());
            chunk.set_prop(prop_keys::SELECTION_CONFIDENCE, selection.confidence as f64);
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SourceHints, SourceType};

    fn parsed(text: &str) -> ParsedContent {
        ParsedContent::without_structure(text.to_string(), SourceHints::new("t.txt", text.len() as u64, SourceType::PlainText))
    }

    #[tokio::test]
    async fn delegates_and_tags_chunks_with_selection() {
        let registry = StrategyRegistry::with_builtins();
        let auto = AutoStrategy::new(registry, StrategyServices::default(), false);
        let text = "1. First requirement\n2. Second requirement\nThe system shall comply.";
        let chunks = auto.chunk(&parsed(text), &ChunkingOptions::default()).await.unwrap();
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.strategy_name.starts_with("Auto("));
            assert!(c.props.contains_key(prop_keys::AUTO_SELECTED_STRATEGY));
        }
    }

    #[tokio::test]
    async fn force_strategy_bypasses_selector() {
        let registry = StrategyRegistry::with_builtins();
        let auto = AutoStrategy::new(registry, StrategyServices::default(), false);
        let mut options = ChunkingOptions::default();
        options.custom.insert("ForceStrategy".to_string(), serde_json::json!("FixedSize"));
        let chunks = auto.chunk(&parsed("Some plain content here."), &options).await.unwrap();
        assert!(chunks.iter().all(|c| c.strategy_name == "Auto(FixedSize)"));
    }
}
