//! Document fetching: download a bill URL into a scratch file.
//!
//! The response body is streamed chunk by chunk into a
//! [`tempfile::NamedTempFile`], so memory use stays flat regardless of
//! document size. The returned [`ScratchDocument`] owns that file and removes
//! it when dropped, which is what gives the orchestrator its cleanup
//! guarantee on every exit path, early `?` returns and panics included.

use crate::error::BillExtractError;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// File-type hint inferred from the document URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Jpeg,
    Png,
}

impl DocumentKind {
    /// Infer the kind from the URL text, case-insensitively.
    ///
    /// This only picks the scratch file suffix and the MIME type sent to the
    /// model; it is never used to reject a document. A URL mentioning both
    /// `.jpg` and `.png` is treated as PNG.
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.contains(".png") {
            DocumentKind::Png
        } else if lower.contains(".jpg") || lower.contains(".jpeg") {
            DocumentKind::Jpeg
        } else {
            DocumentKind::Pdf
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => ".pdf",
            DocumentKind::Jpeg => ".jpg",
            DocumentKind::Png => ".png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Jpeg => "image/jpeg",
            DocumentKind::Png => "image/png",
        }
    }
}

/// A downloaded document living in local scratch storage.
///
/// Dropping the value deletes the file. A failed deletion is logged at WARN
/// and otherwise ignored: it must never replace the outcome being returned.
#[derive(Debug)]
pub struct ScratchDocument {
    file: Option<NamedTempFile>,
    path: PathBuf,
    kind: DocumentKind,
    size_bytes: u64,
}

impl ScratchDocument {
    /// Take ownership of a scratch file; it is removed when the value drops.
    pub(crate) fn from_temp(file: NamedTempFile, kind: DocumentKind) -> Self {
        Self {
            path: file.path().to_path_buf(),
            file: Some(file),
            kind,
            size_bytes: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

impl Drop for ScratchDocument {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => debug!("Removed scratch file {}", self.path.display()),
                Err(e) => warn!(
                    "Failed to remove scratch file {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Build the HTTP client used for document downloads.
pub fn build_client(timeout_secs: Option<u64>) -> Result<reqwest::Client, BillExtractError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| BillExtractError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Download `url` into a uniquely named scratch file.
///
/// Single attempt: any transport error, non-2xx status or write failure is
/// returned immediately. Nothing is left on disk when this returns `Err`.
pub async fn fetch_document(
    client: &reqwest::Client,
    url: &str,
    scratch_dir: Option<&Path>,
    timeout_secs: Option<u64>,
) -> Result<ScratchDocument, BillExtractError> {
    if !is_url(url) {
        return Err(BillExtractError::DownloadFailed {
            url: url.to_string(),
            reason: "not an HTTP/HTTPS URL".to_string(),
        });
    }

    info!("Downloading bill from: {}", url);
    let kind = DocumentKind::from_url(url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| transport_error(url, e, timeout_secs))?;

    if !response.status().is_success() {
        return Err(BillExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix("bill-").suffix(kind.extension());
    let temp = match scratch_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| BillExtractError::ScratchWriteFailed {
        path: scratch_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir),
        source: e,
    })?;

    // From here on the guard owns the file, so every `?` below cleans up.
    let mut document = ScratchDocument::from_temp(temp, kind);

    let handle = document
        .file
        .as_ref()
        .map(|f| f.as_file().try_clone())
        .transpose()
        .map_err(|e| scratch_error(&document.path, e))?
        .ok_or_else(|| BillExtractError::Internal("scratch file already released".into()))?;
    let mut writer = tokio::fs::File::from_std(handle);

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| transport_error(url, e, timeout_secs))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| scratch_error(&document.path, e))?;
        document.size_bytes += chunk.len() as u64;
    }
    writer
        .flush()
        .await
        .map_err(|e| scratch_error(&document.path, e))?;

    info!(
        "Downloaded {} bytes to: {}",
        document.size_bytes,
        document.path.display()
    );
    Ok(document)
}

fn transport_error(url: &str, e: reqwest::Error, timeout_secs: Option<u64>) -> BillExtractError {
    match timeout_secs {
        Some(secs) if e.is_timeout() => BillExtractError::DownloadTimeout {
            url: url.to_string(),
            secs,
        },
        _ => BillExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        },
    }
}

fn scratch_error(path: &Path, source: std::io::Error) -> BillExtractError {
    BillExtractError::ScratchWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/bill.pdf"));
        assert!(is_url("HTTP://example.com/bill.pdf"));
        assert!(!is_url("/tmp/bill.pdf"));
        assert!(!is_url("ftp://example.com/bill.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn kind_from_url() {
        assert_eq!(DocumentKind::from_url("https://x.io/a/bill.pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_url("https://x.io/scan.JPG"), DocumentKind::Jpeg);
        assert_eq!(DocumentKind::from_url("https://x.io/scan.jpeg?sig=1"), DocumentKind::Jpeg);
        assert_eq!(DocumentKind::from_url("https://x.io/page.Png"), DocumentKind::Png);
        assert_eq!(DocumentKind::from_url("https://x.io/download?id=42"), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::from_url("https://x.io/thumb.jpg/full.png"),
            DocumentKind::Png
        );
    }

    #[test]
    fn kind_suffix_and_mime() {
        assert_eq!(DocumentKind::Jpeg.extension(), ".jpg");
        assert_eq!(DocumentKind::Png.mime_type(), "image/png");
        assert_eq!(DocumentKind::Pdf.mime_type(), "application/pdf");
    }

    #[tokio::test]
    async fn rejects_non_http_input_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let client = build_client(None).unwrap();
        let err = fetch_document(&client, "file:///etc/passwd", Some(dir.path()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BillExtractError::DownloadFailed { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn dropping_scratch_document_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let temp = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile_in(dir.path())
            .unwrap();
        let path = temp.path().to_path_buf();
        let doc = ScratchDocument::from_temp(temp, DocumentKind::Pdf);
        assert!(path.exists());
        drop(doc);
        assert!(!path.exists());
    }

    #[test]
    fn drop_tolerates_already_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let temp = tempfile::Builder::new().tempfile_in(dir.path()).unwrap();
        let path = temp.path().to_path_buf();
        let doc = ScratchDocument::from_temp(temp, DocumentKind::Pdf);
        std::fs::remove_file(&path).unwrap();
        // Cleanup failure is logged, never panics.
        drop(doc);
        assert!(!path.exists());
    }
}
