//! # medbill-extract
//!
//! Extract billed line items from medical bill documents (PDF, JPEG, PNG)
//! using a vision-capable LLM, grouped by page and ready for billing-audit
//! tooling.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch      stream the document into a self-deleting scratch file
//!  ├─ 2. Model      upload + one JSON-mode generate call (Gemini by default)
//!  ├─ 3. Parse      strict JSON validation, quantity/rate defaults
//!  ├─ 4. Aggregate  recompute total_item_count locally
//!  └─ 5. Respond    uniform success/failure ExtractionResponse
//! ```
//!
//! Every call returns an [`ExtractionResponse`]; failures at any stage are
//! reported in it (`is_success = false`, zeroed `token_usage`) rather than
//! raised, and the scratch file is gone by the time it is returned.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medbill_extract::{BillExtractor, ExtractorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY unless set on the builder
//!     let extractor = BillExtractor::new(ExtractorConfig::default())?;
//!     let response = extractor.extract("https://example.com/bill.pdf").await;
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on (via `cli`) | axum router exposing `POST /extract-bill-data` |
//! | `cli`    | on      | Enables the `medbill` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractorConfig, ExtractorConfigBuilder};
pub use error::{BillExtractError, ErrorKind};
pub use extract::{extract_bill, extract_bill_sync, BillExtractor};
pub use model::{ExtractionModel, GeminiClient, ModelOutput, ProviderModel};
pub use output::{
    BillItem, ExtractionData, ExtractionRequest, ExtractionResponse, PageLineItems, PageType,
    TokenUsage,
};
pub use pipeline::fetch::{DocumentKind, ScratchDocument};
