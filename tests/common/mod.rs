//! Shared helpers for integration tests: a local document host and a
//! recording fake model.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Router};
use medbill_extract::{
    BillExtractError, DocumentKind, ExtractionModel, ModelOutput, ScratchDocument, TokenUsage,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n% fake hospital bill\n%%EOF\n";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-scan";

pub const BED_CHARGES_JSON: &str = r#"{"pagewise_line_items":[{"page_no":"1","page_type":"Bill Detail","bill_items":[{"item_name":"Bed Charges","item_amount":500.0,"item_rate":500.0,"item_quantity":1.0}]}]}"#;

/// Size of the `/big.pdf` document, large enough to arrive in many chunks.
pub const BIG_DOC_LEN: usize = 3 * 1024 * 1024;

/// How long `/slow.pdf` waits before answering.
pub const SLOW_DOC_DELAY: Duration = Duration::from_secs(10);

/// Serve `app` on an ephemeral localhost port.
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A document host with a PDF, a PNG, a large PDF, a 500 route and a route
/// that stalls for [`SLOW_DOC_DELAY`]. Anything else is a 404.
pub async fn spawn_document_host() -> SocketAddr {
    let app = Router::new()
        .route("/bill.pdf", get(|| async { PDF_BYTES }))
        .route("/scans/page1.PNG", get(|| async { PNG_BYTES }))
        .route("/big.pdf", get(|| async { vec![b'x'; BIG_DOC_LEN] }))
        .route(
            "/broken.pdf",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/slow.pdf",
            get(|| async {
                tokio::time::sleep(SLOW_DOC_DELAY).await;
                PDF_BYTES
            }),
        );
    spawn(app).await
}

/// An address nothing is listening on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// What the fake model observed for one call.
#[derive(Debug, Clone)]
pub struct SeenDocument {
    pub path: PathBuf,
    pub existed: bool,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
    pub prompt: String,
}

/// Fake model returning a canned reply and recording each document.
pub struct FakeModel {
    reply: Result<String, String>,
    usage: TokenUsage,
    seen: Mutex<Vec<SeenDocument>>,
}

impl FakeModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            usage: TokenUsage::new(1500, 220),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            usage: TokenUsage::default(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn seen(&self) -> Vec<SeenDocument> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionModel for FakeModel {
    fn name(&self) -> &str {
        "fake/model"
    }

    async fn extract(
        &self,
        document: &ScratchDocument,
        prompt: &str,
    ) -> Result<ModelOutput, BillExtractError> {
        let path = document.path().to_path_buf();
        self.seen.lock().unwrap().push(SeenDocument {
            existed: path.exists(),
            bytes: std::fs::read(&path).unwrap_or_default(),
            kind: document.kind(),
            prompt: prompt.to_string(),
            path,
        });
        match &self.reply {
            Ok(text) => Ok(ModelOutput {
                text: text.clone(),
                usage: self.usage,
            }),
            Err(message) => Err(BillExtractError::ModelApiError {
                message: message.clone(),
            }),
        }
    }
}

/// Number of entries left in a scratch directory.
pub fn scratch_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
