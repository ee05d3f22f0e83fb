//! Model extraction clients.
//!
//! [`ExtractionModel`] is the seam between the pipeline and the external
//! inference service: it takes the downloaded document plus the fixed
//! instruction prompt and returns the raw text payload with token usage.
//! Parsing that text is not its job (see [`crate::pipeline::parse`]).
//!
//! Two implementations ship with the crate:
//!
//! * [`GeminiClient`]: talks to the Gemini REST API directly. It uploads
//!   the document through the Files API, then asks for a JSON-only answer.
//! * [`ProviderModel`]: wraps any `edgequake_llm::LLMProvider` and sends the
//!   document inline as base64, for OpenAI/Anthropic/Mistral/Ollama vision
//!   models.
//!
//! Each call is attempted exactly once; retries are left to the caller.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiClient;
pub use provider::ProviderModel;

use crate::config::ExtractorConfig;
use crate::error::BillExtractError;
use crate::output::TokenUsage;
use crate::pipeline::fetch::ScratchDocument;
use async_trait::async_trait;
use std::sync::Arc;

/// Raw model answer: unparsed text plus usage accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub text: String,
    pub usage: TokenUsage,
}

/// A vision model able to read a bill document and answer with JSON text.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Short label for logs, e.g. `"gemini/gemini-1.5-flash"`.
    fn name(&self) -> &str;

    /// Submit `document` with `prompt` and return the raw response.
    ///
    /// Upload and inference failures map to errors of kind
    /// [`crate::error::ErrorKind::ModelService`].
    async fn extract(
        &self,
        document: &ScratchDocument,
        prompt: &str,
    ) -> Result<ModelOutput, BillExtractError>;
}

/// Resolve the model client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.model_client`): used as-is. This is how
///    tests substitute a fake.
/// 2. **Named non-Gemini provider** (`config.provider_name`, e.g. `"openai"`):
///    built through `edgequake_llm::ProviderFactory`, which reads the
///    provider's own API key variable.
/// 3. **Gemini** (no provider name, or `"gemini"`/`"google"`): API key from
///    `config.api_key`, falling back to `GEMINI_API_KEY`.
pub fn resolve_model(config: &ExtractorConfig) -> Result<Arc<dyn ExtractionModel>, BillExtractError> {
    if let Some(ref client) = config.model_client {
        return Ok(Arc::clone(client));
    }

    match config.provider_name.as_deref() {
        None | Some("gemini") | Some("google") => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| {
                    std::env::var("GEMINI_API_KEY")
                        .ok()
                        .filter(|k| !k.trim().is_empty())
                })
                .ok_or_else(|| BillExtractError::ModelNotConfigured {
                    provider: "gemini".to_string(),
                    hint: "Set GEMINI_API_KEY or pass an API key in the config.".to_string(),
                })?;
            Ok(Arc::new(GeminiClient::new(api_key, config)?))
        }
        Some(name) => Ok(Arc::new(ProviderModel::from_factory(name, config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned;

    #[async_trait]
    impl ExtractionModel for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn extract(
            &self,
            _document: &ScratchDocument,
            _prompt: &str,
        ) -> Result<ModelOutput, BillExtractError> {
            Ok(ModelOutput {
                text: "{}".into(),
                usage: TokenUsage::default(),
            })
        }
    }

    #[test]
    fn prebuilt_client_wins() {
        let config = ExtractorConfig::builder()
            .provider_name("openai")
            .model_client(Arc::new(Canned))
            .build()
            .unwrap();
        let model = resolve_model(&config).unwrap();
        assert_eq!(model.name(), "canned");
    }

    #[test]
    fn explicit_gemini_key_builds_gemini_client() {
        let config = ExtractorConfig::builder()
            .api_key("test-key")
            .model("gemini-1.5-pro")
            .build()
            .unwrap();
        let model = resolve_model(&config).unwrap();
        assert_eq!(model.name(), "gemini/gemini-1.5-pro");
    }
}
