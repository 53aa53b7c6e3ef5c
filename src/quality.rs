//! Post-hoc quality measurement: chunk-set metrics, synthetic QA
//! generation, answerability validation, and strategy recommendations.
//! Entirely observational — nothing here feeds back into chunking
//! automatically, it informs the `evaluate` CLI command and benchmarking.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryQualityEvaluator;
use crate::chunking::StrategyServices;
use crate::data::{Chunk, ParsedContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    Factual,
    Conceptual,
    Analytical,
    Procedural,
    Comparative,
    Inferential,
    MultiHop,
}

const QUESTION_TYPES: [QuestionType; 7] = [
    QuestionType::Factual,
    QuestionType::Conceptual,
    QuestionType::Analytical,
    QuestionType::Procedural,
    QuestionType::Comparative,
    QuestionType::Inferential,
    QuestionType::MultiHop,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub question_type: QuestionType,
    pub source_sentence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingQuality {
    pub average_completeness: f32,
    pub content_consistency: f32,
    pub boundary_quality: f32,
    pub size_distribution: f32,
    pub overlap_effectiveness: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerabilityReport {
    pub total: usize,
    pub answerable: usize,
    pub high_quality: usize,
    pub avg_confidence: f32,
}

#[derive(Debug, Default)]
pub struct QualityEngine {
    evaluator: BoundaryQualityEvaluator,
}

impl QualityEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self, chunks: &[Chunk]) -> ChunkingQuality {
        if chunks.is_empty() {
            return ChunkingQuality {
                average_completeness: 0.0,
                content_consistency: 0.0,
                boundary_quality: 0.0,
                size_distribution: 0.0,
                overlap_effectiveness: 0.0,
            };
        }

        let average_completeness = chunks.iter().map(|c| completeness(&c.content)).sum::<f32>() / chunks.len() as f32;

        let lengths: Vec<f32> = chunks.iter().map(|c| c.content.len() as f32).collect();
        let content_consistency = inverse_coefficient_of_variation(&lengths);
        let size_distribution = content_consistency;

        let boundary_quality = self.boundary_quality(chunks);
        let overlap_effectiveness = self.overlap_effectiveness(chunks);

        ChunkingQuality {
            average_completeness,
            content_consistency,
            boundary_quality,
            size_distribution,
            overlap_effectiveness,
        }
    }

    fn boundary_quality(&self, chunks: &[Chunk]) -> f32 {
        if chunks.len() < 2 {
            return 1.0;
        }
        let text = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n");
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < 2 {
            return 1.0;
        }
        let mut total = 0.0;
        let mut count = 0;
        let mut cursor = 0usize;
        for chunk in &chunks[..chunks.len() - 1] {
            cursor += chunk.content.lines().count();
            if cursor > 0 && cursor < lines.len() {
                total += self.evaluator.evaluate(&lines, cursor).quality;
                count += 1;
            }
        }
        if count == 0 {
            1.0
        } else {
            total / count as f32
        }
    }

    fn overlap_effectiveness(&self, chunks: &[Chunk]) -> f32 {
        if chunks.len() < 2 {
            return 0.0;
        }
        let mut total = 0.0;
        for window in chunks.windows(2) {
            total += word_jaccard(&window[0].content, &window[1].content);
        }
        total / (chunks.len() - 1) as f32
    }

    /// `n` questions spread as evenly as possible across the seven
    /// question types, using the LLM when available and falling back to a
    /// deterministic per-type sentence template otherwise.
    pub async fn generate_questions(&self, parsed: &ParsedContent, n: usize, services: &StrategyServices) -> Vec<Question> {
        let sentences: Vec<&str> = crate::overlap::split_sentences(&parsed.text);
        if sentences.is_empty() || n == 0 {
            return Vec::new();
        }

        let mut questions = Vec::with_capacity(n);
        for i in 0..n {
            let qtype = QUESTION_TYPES[i % QUESTION_TYPES.len()];
            let sentence = sentences[i % sentences.len()];

            let text = if let Some(llm) = &services.llm {
                let prompt = format!("Write a {qtype:?} question about: {sentence}");
                llm.complete(&prompt).await.unwrap_or_else(|_| template_question(qtype, sentence))
            } else {
                template_question(qtype, sentence)
            };

            questions.push(Question {
                text,
                question_type: qtype,
                source_sentence: sentence.to_string(),
            });
        }
        questions
    }

    /// Jaccard overlap of question words (length > 3) against each
    /// chunk's word set, over the top-3 matching chunks per question.
    pub fn validate_answerability(&self, questions: &[Question], chunks: &[Chunk]) -> AnswerabilityReport {
        if questions.is_empty() || chunks.is_empty() {
            return AnswerabilityReport {
                total: questions.len(),
                answerable: 0,
                high_quality: 0,
                avg_confidence: 0.0,
            };
        }

        let mut answerable = 0;
        let mut high_quality = 0;
        let mut total_confidence = 0.0;

        for question in questions {
            let mut scores: Vec<f32> = chunks.iter().map(|c| word_jaccard(&question.text, &c.content)).collect();
            scores.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let top3 = &scores[..scores.len().min(3)];
            let confidence = if top3.is_empty() { 0.0 } else { top3.iter().sum::<f32>() / top3.len() as f32 };

            total_confidence += confidence;
            if confidence > 0.3 {
                answerable += 1;
            }
            if confidence > 0.6 {
                high_quality += 1;
            }
        }

        AnswerabilityReport {
            total: questions.len(),
            answerable,
            high_quality,
            avg_confidence: total_confidence / questions.len() as f32,
        }
    }

    /// Weighted composite used to rank strategies in A/B benchmarks:
    /// chunking quality 40%, information density 30%, structure
    /// preservation 30%.
    pub fn overall_score(&self, quality: &ChunkingQuality, density: f32, structure_preservation: f32) -> f32 {
        let chunking_score =
            (quality.average_completeness + quality.content_consistency + quality.boundary_quality + quality.size_distribution)
                / 4.0;
        0.4 * chunking_score + 0.3 * density + 0.3 * structure_preservation
    }

    /// Ordered, deficiency-keyed suggestions; empty when nothing stands
    /// out.
    pub fn recommendations(&self, quality: &ChunkingQuality) -> Vec<String> {
        let mut recs = Vec::new();
        if quality.size_distribution < 0.5 {
            recs.push("chunk sizes vary widely; consider shrinking MaxChunkSize".to_string());
        }
        if quality.boundary_quality < 0.6 {
            recs.push("boundaries are weak; switch to the Intelligent strategy".to_string());
        }
        if quality.overlap_effectiveness > 0.8 {
            recs.push("high redundancy between chunks; enable content filtering".to_string());
        }
        if quality.average_completeness < 0.5 {
            recs.push("low structural preservation; enable structural cues in options".to_string());
        }
        recs
    }
}

fn completeness(content: &str) -> f32 {
    let trimmed = content.trim_end();
    if trimmed.ends_with(['.', '!', '?', '。']) {
        1.0
    } else if trimmed.is_empty() {
        0.0
    } else {
        0.5
    }
}

fn inverse_coefficient_of_variation(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 1.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    if mean == 0.0 {
        return 1.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    let cv = variance.sqrt() / mean;
    (1.0 - cv).clamp(0.0, 1.0)
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.len() > 3)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn word_jaccard(a: &str, b: &str) -> f32 {
    let sa = word_set(a);
    let sb = word_set(b);
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn template_question(qtype: QuestionType, sentence: &str) -> String {
    let subject = sentence.trim_end_matches(['.', '!', '?']).to_string();
    match qtype {
        QuestionType::Factual => format!("What does the text say about: {subject}?"),
        QuestionType::Conceptual => format!("What concept underlies: {subject}?"),
        QuestionType::Analytical => format!("Why is it the case that {subject}?"),
        QuestionType::Procedural => format!("How would one carry out: {subject}?"),
        QuestionType::Comparative => format!("How does this compare: {subject}?"),
        QuestionType::Inferential => format!("What can be inferred from: {subject}?"),
        QuestionType::MultiHop => format!("What else connects to: {subject}?"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ChunkLocation, SourceHints, SourceType};
    use uuid::Uuid;

    fn chunk(content: &str, index: usize) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            index,
            content: content.to_string(),
            strategy_name: "Test".to_string(),
            location: ChunkLocation {
                start_char: 0,
                end_char: content.len(),
                heading_path: Vec::new(),
                page_number: None,
            },
            estimated_tokens: 1,
            context_dependency: 0.0,
            props: Default::default(),
        }
    }

    #[test]
    fn metrics_on_empty_chunk_list_are_zero() {
        let engine = QualityEngine::new();
        let metrics = engine.metrics(&[]);
        assert_eq!(metrics.average_completeness, 0.0);
    }

    #[test]
    fn uniform_lengths_give_high_consistency() {
        let engine = QualityEngine::new();
        let chunks = vec![chunk("word word word.", 0), chunk("word word word.", 1), chunk("word word word.", 2)];
        let metrics = engine.metrics(&chunks);
        assert!(metrics.content_consistency > 0.9);
    }

    #[tokio::test]
    async fn generate_questions_spreads_across_types() {
        let engine = QualityEngine::new();
        let parsed = ParsedContent::without_structure(
            "First fact here. Second fact follows. Third fact concludes.".to_string(),
            SourceHints::new("t.txt", 10, SourceType::PlainText),
        );
        let questions = engine.generate_questions(&parsed, 7, &StrategyServices::default()).await;
        assert_eq!(questions.len(), 7);
        let distinct_types: HashSet<_> = questions.iter().map(|q| q.question_type).collect();
        assert_eq!(distinct_types.len(), 7);
    }

    #[test]
    fn validate_answerability_scores_relevant_chunk_highly() {
        let engine = QualityEngine::new();
        let question = Question {
            text: "What about retrieval augmented generation pipelines?".to_string(),
            question_type: QuestionType::Factual,
            source_sentence: "Retrieval augmented generation pipelines chunk documents.".to_string(),
        };
        let chunks = vec![chunk("Retrieval augmented generation pipelines chunk documents carefully.", 0)];
        let report = engine.validate_answerability(&[question], &chunks);
        assert_eq!(report.total, 1);
        assert!(report.avg_confidence > 0.0);
    }

    #[test]
    fn recommendations_flag_weak_boundaries() {
        let engine = QualityEngine::new();
        let quality = ChunkingQuality {
            average_completeness: 0.9,
            content_consistency: 0.9,
            boundary_quality: 0.2,
            size_distribution: 0.9,
            overlap_effectiveness: 0.1,
        };
        let recs = engine.recommendations(&quality);
        assert!(recs.iter().any(|r| r.contains("Intelligent")));
    }
}
