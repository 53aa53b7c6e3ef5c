//! Optional collaborators the pipeline calls out to, never required: the
//! orchestrator and the `Auto` selector both degrade gracefully to
//! rule-based behavior when no implementation is registered.

use async_trait::async_trait;

use crate::error::PipelineResult;

/// A text-completion backend used by [`crate::chunking::selector`] for
/// LLM-assisted strategy selection and by [`crate::quality`] for QA
/// generation. Implementations are expected to fail fast rather than hang;
/// callers apply their own timeout via `MaxAnalysisTime`.
#[async_trait]
pub trait TextCompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> PipelineResult<String>;
}

/// Describes an image in natural language, for enrichment of documents
/// whose extracted content references figures. No built-in reader
/// currently emits image content, so this is consulted defensively.
#[async_trait]
pub trait ImageToTextService: Send + Sync {
    async fn describe(&self, image_bytes: &[u8], mime_type: &str) -> PipelineResult<String>;
}

/// Always reports unavailable; the default when no LLM is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTextCompletionService;

#[async_trait]
impl TextCompletionService for NullTextCompletionService {
    async fn complete(&self, _prompt: &str) -> PipelineResult<String> {
        Err(crate::error::PipelineError::ServiceUnavailable(
            "no text-completion service configured".to_string(),
        ))
    }
}

#[cfg(feature = "llm")]
pub mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    use crate::error::{PipelineError, PipelineResult};

    use super::TextCompletionService;

    /// A plain HTTP JSON completion client, compatible with any service
    /// exposing a `{"prompt": ...} -> {"text": ...}` contract (the reqwest
    /// dependency is shared with the reader stack; this is not tied to any
    /// particular vendor's SDK).
    #[derive(Debug, Clone)]
    pub struct HttpTextCompletionService {
        endpoint: String,
        client: reqwest::Client,
        timeout: Duration,
    }

    #[derive(Deserialize)]
    struct CompletionResponse {
        text: String,
    }

    impl HttpTextCompletionService {
        pub fn new(endpoint: impl Into<String>) -> Self {
            Self {
                endpoint: endpoint.into(),
                client: reqwest::Client::new(),
                timeout: Duration::from_secs(10),
            }
        }

        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }
    }

    #[async_trait]
    impl TextCompletionService for HttpTextCompletionService {
        async fn complete(&self, prompt: &str) -> PipelineResult<String> {
            let response = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(&json!({ "prompt": prompt }))
                .send()
                .await
                .map_err(|e| PipelineError::ServiceUnavailable(e.to_string()))?;

            if !response.status().is_success() {
                return Err(PipelineError::ServiceUnavailable(format!(
                    "completion service returned {}",
                    response.status()
                )));
            }

            let parsed: CompletionResponse = response
                .json()
                .await
                .map_err(|e| PipelineError::ServiceUnavailable(e.to_string()))?;
            Ok(parsed.text)
        }
    }
}
