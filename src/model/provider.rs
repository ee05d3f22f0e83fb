//! Adapter running extraction through any `edgequake_llm` vision provider.
//!
//! ## Message Layout
//!
//! 1. **System message**: the extraction prompt
//! 2. **User message**: a short instruction plus the document attached as a
//!    base64 `ImageData` with its real MIME type (`application/pdf`,
//!    `image/jpeg`, `image/png`)
//!
//! Unlike [`super::GeminiClient`] there is no upload step and no server-side
//! JSON mode; the prompt's output-format rules carry the contract and the
//! parser tolerates a fenced answer.

use super::{ExtractionModel, ModelOutput};
use crate::config::ExtractorConfig;
use crate::error::BillExtractError;
use crate::output::TokenUsage;
use crate::pipeline::fetch::ScratchDocument;
use crate::prompts::DOCUMENT_TURN_TEXT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Extraction model backed by an `edgequake_llm::LLMProvider`.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
    timeout: Option<Duration>,
}

impl ProviderModel {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &ExtractorConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            timeout: config.api_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Instantiate a named provider via `ProviderFactory`, which reads the
    /// provider's API key (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …) from the
    /// environment.
    pub fn from_factory(provider_name: &str, config: &ExtractorConfig) -> Result<Self, BillExtractError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, &config.model).map_err(
            |e| BillExtractError::ModelNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            },
        )?;
        Ok(Self::new(
            provider,
            format!("{provider_name}/{}", config.model),
            config,
        ))
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ExtractionModel for ProviderModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn extract(
        &self,
        document: &ScratchDocument,
        prompt: &str,
    ) -> Result<ModelOutput, BillExtractError> {
        let bytes = tokio::fs::read(document.path())
            .await
            .map_err(|e| BillExtractError::ModelUploadFailed {
                reason: format!("could not read '{}': {e}", document.path().display()),
            })?;
        info!("Sending {} bytes inline to {}", bytes.len(), self.label);

        let attachment = ImageData::new(STANDARD.encode(&bytes), document.kind().mime_type());
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images(DOCUMENT_TURN_TEXT, vec![attachment]),
        ];
        let options = self.build_options();

        let call = self.provider.chat(&messages, Some(&options));
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                BillExtractError::ModelApiError {
                    message: format!("{} timed out after {}s", self.label, limit.as_secs()),
                }
            })?,
            None => call.await,
        };
        let response = result.map_err(|e| BillExtractError::ModelApiError {
            message: format!("{e}"),
        })?;

        let usage = TokenUsage::new(
            response.prompt_tokens as u64,
            response.completion_tokens as u64,
        );
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, usage.input_tokens, usage.output_tokens
        );

        Ok(ModelOutput {
            text: response.content,
            usage,
        })
    }
}
