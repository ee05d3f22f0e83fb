//! Extraction entry points: the pipeline orchestrator.
//!
//! [`BillExtractor`] runs fetch → model → parse → aggregate for one URL.
//! Its public [`BillExtractor::extract`] never returns an error: any stage
//! failure becomes a failed [`ExtractionResponse`] with zeroed token usage,
//! so an HTTP layer can serialise whatever comes back.
//!
//! The downloaded document is held in a [`ScratchDocument`] that lives only
//! inside [`BillExtractor::try_extract`]. Whichever way that function exits,
//! the guard is dropped and the file removed before the response exists.

use crate::config::ExtractorConfig;
use crate::error::BillExtractError;
use crate::model::{resolve_model, ExtractionModel};
use crate::output::{ExtractionData, ExtractionResponse, TokenUsage};
use crate::pipeline::{aggregate, fetch, parse};
use crate::prompts::EXTRACTION_PROMPT;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reusable, thread-safe extraction pipeline.
///
/// Holds only immutable state (config, pooled HTTP client, model client), so
/// one instance can serve many concurrent requests behind an `Arc`.
pub struct BillExtractor {
    config: ExtractorConfig,
    http: reqwest::Client,
    model: Arc<dyn ExtractionModel>,
}

impl std::fmt::Debug for BillExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillExtractor")
            .field("config", &self.config)
            .field("model", &self.model.name())
            .finish()
    }
}

impl BillExtractor {
    /// Build an extractor, resolving the model client from `config`.
    ///
    /// # Errors
    /// `ModelNotConfigured` when no API key or provider can be found.
    pub fn new(config: ExtractorConfig) -> Result<Self, BillExtractError> {
        let model = resolve_model(&config)?;
        Self::with_model(config, model)
    }

    /// Build an extractor around an explicit model client.
    pub fn with_model(
        config: ExtractorConfig,
        model: Arc<dyn ExtractionModel>,
    ) -> Result<Self, BillExtractError> {
        let http = fetch::build_client(config.download_timeout_secs)?;
        Ok(Self {
            config,
            http,
            model,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Extract line items from the bill at `document_url`.
    ///
    /// Always returns a well-formed response; failures are reported through
    /// `is_success = false` and `error_message`.
    pub async fn extract(&self, document_url: &str) -> ExtractionResponse {
        let start = Instant::now();
        info!("Starting extraction: {}", document_url);

        match self.try_extract(document_url).await {
            Ok((data, usage)) => {
                info!(
                    "Extraction complete: {} pages, {} items, {} tokens, {}ms",
                    data.pagewise_line_items.len(),
                    data.total_item_count,
                    usage.total_tokens,
                    start.elapsed().as_millis()
                );
                ExtractionResponse::success(data, usage)
            }
            Err(e) => {
                warn!(
                    "Extraction failed ({}) after {}ms: {}",
                    e.kind(),
                    start.elapsed().as_millis(),
                    e
                );
                ExtractionResponse::failure(&e)
            }
        }
    }

    /// Run the pipeline, propagating the first stage error.
    pub async fn try_extract(
        &self,
        document_url: &str,
    ) -> Result<(ExtractionData, TokenUsage), BillExtractError> {
        if document_url.trim().is_empty() {
            return Err(BillExtractError::EmptyDocumentUrl);
        }

        // ── Step 1: Fetch document ───────────────────────────────────────
        let document = fetch::fetch_document(
            &self.http,
            document_url.trim(),
            self.config.scratch_dir.as_deref(),
            self.config.download_timeout_secs,
        )
        .await?;

        // ── Step 2: Upload + extract ─────────────────────────────────────
        let model_start = Instant::now();
        let output = self.model.extract(&document, EXTRACTION_PROMPT).await?;
        debug!(
            "{} answered in {}ms ({} chars)",
            self.model.name(),
            model_start.elapsed().as_millis(),
            output.text.len()
        );

        // The model has what it needs; release the scratch file now.
        drop(document);

        // ── Step 3: Parse + validate ─────────────────────────────────────
        let pages = parse::parse_model_output(&output.text)?;

        // ── Step 4: Aggregate ────────────────────────────────────────────
        Ok((aggregate::aggregate(pages), output.usage))
    }
}

/// Extract line items from a bill URL with a one-off extractor.
///
/// Convenience wrapper for scripts; services should build one
/// [`BillExtractor`] at startup and share it. Configuration problems are
/// reported in the response like any other failure.
pub async fn extract_bill(document_url: impl AsRef<str>, config: &ExtractorConfig) -> ExtractionResponse {
    match BillExtractor::new(config.clone()) {
        Ok(extractor) => extractor.extract(document_url.as_ref()).await,
        Err(e) => {
            warn!("Extractor setup failed ({}): {}", e.kind(), e);
            ExtractionResponse::failure(&e)
        }
    }
}

/// Synchronous wrapper around [`extract_bill`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn extract_bill_sync(document_url: impl AsRef<str>, config: &ExtractorConfig) -> ExtractionResponse {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(extract_bill(document_url, config)),
        Err(e) => ExtractionResponse::failure(&BillExtractError::Internal(format!(
            "Failed to create tokio runtime: {e}"
        ))),
    }
}
