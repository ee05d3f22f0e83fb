//! Gemini REST client: Files API upload + JSON-mode `generateContent`.
//!
//! ## Request sequence
//!
//! ```text
//! POST /upload/v1beta/files            (resumable start → x-goog-upload-url)
//! POST <upload url>                    (upload, finalize → file uri)
//! POST /v1beta/models/{m}:generateContent
//! DELETE /v1beta/{file name}           (best effort)
//! ```
//!
//! The scratch file is streamed from disk into the upload and then referenced
//! by URI in the generate call, so large scanned PDFs are never held in
//! memory or sent inside a JSON body. The final delete only keeps
//! the remote project tidy; Gemini expires uploads on its own, so a failed
//! delete is logged and ignored.

use super::{ExtractionModel, ModelOutput};
use crate::config::ExtractorConfig;
use crate::error::BillExtractError;
use crate::output::TokenUsage;
use crate::pipeline::fetch::ScratchDocument;
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Longest slice of an error body quoted back in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Client for the Gemini generative-language API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    label: String,
    temperature: f32,
    max_output_tokens: usize,
    display_name: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    name: String,
    uri: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

impl From<UsageMetadata> for TokenUsage {
    fn from(u: UsageMetadata) -> Self {
        let total = if u.total_token_count > 0 {
            u.total_token_count
        } else {
            u.prompt_token_count + u.candidates_token_count
        };
        TokenUsage {
            total_tokens: total,
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Build a client from the shared config and an API key.
    pub fn new(api_key: impl Into<String>, config: &ExtractorConfig) -> Result<Self, BillExtractError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| BillExtractError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            label: format!("gemini/{}", config.model),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            display_name: config.upload_display_name.clone(),
        })
    }

    async fn upload(&self, document: &ScratchDocument) -> Result<UploadedFile, BillExtractError> {
        let unreadable = |e: std::io::Error| {
            upload_error(format!("could not read '{}': {e}", document.path().display()))
        };
        let file = tokio::fs::File::open(document.path())
            .await
            .map_err(unreadable)?;
        let len = file.metadata().await.map_err(unreadable)?.len();
        let mime = document.kind().mime_type();

        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", len.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime)
            .json(&json!({ "file": { "display_name": self.display_name } }))
            .send()
            .await
            .map_err(|e| upload_error(format!("start request failed: {e}")))?;

        if !start.status().is_success() {
            let status = start.status();
            let body = start.text().await.unwrap_or_default();
            return Err(upload_error(format!("HTTP {status}: {}", truncate(&body))));
        }

        let upload_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| upload_error("response carried no upload URL".to_string()))?;

        let finish = self
            .http
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(CONTENT_LENGTH, len)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .map_err(|e| upload_error(format!("upload request failed: {e}")))?;

        if !finish.status().is_success() {
            let status = finish.status();
            let body = finish.text().await.unwrap_or_default();
            return Err(upload_error(format!("HTTP {status}: {}", truncate(&body))));
        }

        let uploaded: UploadResponse = finish
            .json()
            .await
            .map_err(|e| upload_error(format!("unreadable upload response: {e}")))?;

        debug!(
            "Uploaded {} as {} ({})",
            document.path().display(),
            uploaded.file.name,
            uploaded.file.mime_type.as_deref().unwrap_or(mime)
        );
        Ok(uploaded.file)
    }

    async fn generate(
        &self,
        file: &UploadedFile,
        mime: &str,
        prompt: &str,
    ) -> Result<ModelOutput, BillExtractError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "file_data": {
                        "mime_type": file.mime_type.as_deref().unwrap_or(mime),
                        "file_uri": file.uri,
                    } },
                    { "text": prompt },
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        });

        let resp = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| api_error(format!("generateContent request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(format!("HTTP {status}: {}", truncate(&text))));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| api_error(format!("unreadable generateContent response: {e}")))?;

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(api_error(format!("model returned no answer ({reason})")));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(api_error(format!(
                "model returned an empty answer (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage: TokenUsage = parsed.usage_metadata.unwrap_or_default().into();
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, usage.input_tokens, usage.output_tokens
        );
        Ok(ModelOutput { text, usage })
    }

    async fn delete(&self, file: &UploadedFile) {
        let result = self
            .http
            .delete(format!("{}/v1beta/{}", self.base_url, file.name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => debug!("Deleted remote file {}", file.name),
            Ok(resp) => warn!("Failed to delete remote file {}: HTTP {}", file.name, resp.status()),
            Err(e) => warn!("Failed to delete remote file {}: {}", file.name, e),
        }
    }
}

#[async_trait]
impl ExtractionModel for GeminiClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn extract(
        &self,
        document: &ScratchDocument,
        prompt: &str,
    ) -> Result<ModelOutput, BillExtractError> {
        info!("Sending {} bytes to {}", document.size_bytes(), self.label);
        let file = self.upload(document).await?;
        let result = self
            .generate(&file, document.kind().mime_type(), prompt)
            .await;
        self.delete(&file).await;
        result
    }
}

fn upload_error(reason: String) -> BillExtractError {
    BillExtractError::ModelUploadFailed { reason }
}

fn api_error(message: String) -> BillExtractError {
    BillExtractError::ModelApiError { message }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_metadata_maps_to_token_usage() {
        let meta: UsageMetadata = serde_json::from_str(
            r#"{"promptTokenCount": 1500, "candidatesTokenCount": 220, "totalTokenCount": 1720}"#,
        )
        .unwrap();
        let usage: TokenUsage = meta.into();
        assert_eq!(usage.input_tokens, 1500);
        assert_eq!(usage.output_tokens, 220);
        assert_eq!(usage.total_tokens, 1720);
    }

    #[test]
    fn missing_total_is_summed() {
        let meta: UsageMetadata =
            serde_json::from_str(r#"{"promptTokenCount": 10, "candidatesTokenCount": 5}"#).unwrap();
        assert_eq!(TokenUsage::from(meta).total_tokens, 15);
    }

    #[test]
    fn generate_response_joins_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap();
        assert_eq!(text, "{\"a\":1}");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&long).chars().count(), MAX_ERROR_BODY);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ExtractorConfig::builder()
            .api_base_url("http://127.0.0.1:9999/")
            .build()
            .unwrap();
        let client = GeminiClient::new("k", &config).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9999");
    }
}
