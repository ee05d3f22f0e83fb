//! Configuration types for bill extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractorConfig`], built
//! via its [`ExtractorConfigBuilder`]. The config is constructed once at
//! startup and handed to [`crate::extract::BillExtractor`]; nothing in the
//! pipeline reads process-global state, so tests can inject a fake model
//! client through [`ExtractorConfigBuilder::model_client`].

use crate::error::BillExtractError;
use crate::model::ExtractionModel;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Gemini model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for the extraction pipeline.
///
/// # Example
/// ```rust
/// use medbill_extract::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .model("gemini-1.5-pro")
///     .api_key("test-key")
///     .temperature(0.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-1.5-pro");
/// ```
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Provider name: "gemini" (default), or any name understood by
    /// `edgequake_llm::ProviderFactory` ("openai", "anthropic", …).
    pub provider_name: Option<String>,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// API key for the Gemini client. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub api_base_url: String,

    /// Pre-constructed model client. Takes precedence over everything above.
    pub model_client: Option<Arc<dyn ExtractionModel>>,

    /// Sampling temperature, clamped to 0.0–2.0. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// A truncated answer fails JSON parsing, so long itemised bills need
    /// headroom here.
    pub max_output_tokens: usize,

    /// Display name attached to uploaded documents. Default: "Invoice".
    pub upload_display_name: String,

    /// Directory for downloaded scratch files. Default: OS temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Document download timeout in seconds. Default: none.
    pub download_timeout_secs: Option<u64>,

    /// Model API timeout in seconds, applied to every Gemini request and to
    /// each provider chat call. Default: none.
    pub api_timeout_secs: Option<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            provider_name: None,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model_client: None,
            temperature: 0.1,
            max_output_tokens: 8192,
            upload_display_name: "Invoice".to_string(),
            scratch_dir: None,
            download_timeout_secs: None,
            api_timeout_secs: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field(
                "model_client",
                &self.model_client.as_ref().map(|m| m.name().to_string()),
            )
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("upload_display_name", &self.upload_display_name)
            .field("scratch_dir", &self.scratch_dir)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractorConfig {
    /// Create a new builder for `ExtractorConfig`.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn model_client(mut self, client: Arc<dyn ExtractionModel>) -> Self {
        self.config.model_client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn upload_display_name(mut self, name: impl Into<String>) -> Self {
        self.config.upload_display_name = name.into();
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = Some(secs);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractorConfig, BillExtractError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(BillExtractError::InvalidConfig(
                "Model name must not be empty".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(BillExtractError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if !(c.api_base_url.starts_with("http://") || c.api_base_url.starts_with("https://")) {
            return Err(BillExtractError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        if c.download_timeout_secs == Some(0) || c.api_timeout_secs == Some(0) {
            return Err(BillExtractError::InvalidConfig(
                "Timeouts must be ≥ 1 second when set".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractorConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.upload_display_name, "Invoice");
        assert!(c.download_timeout_secs.is_none());
        assert!(c.api_timeout_secs.is_none());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ExtractorConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let err = ExtractorConfig::builder()
            .max_output_tokens(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, BillExtractError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(ExtractorConfig::builder()
            .api_base_url("ftp://example.com")
            .build()
            .is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(ExtractorConfig::builder()
            .download_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractorConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
