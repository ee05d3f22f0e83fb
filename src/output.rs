//! Request and response types for bill extraction.
//!
//! The field names here are the wire format: [`ExtractionResponse`]
//! serialises to exactly the JSON that downstream billing-audit tooling
//! consumes, so renaming a field is a breaking change.

use crate::error::BillExtractError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inbound request: one document URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// HTTP/HTTPS URL of the bill (PDF, JPEG or PNG).
    pub document: String,
}

impl ExtractionRequest {
    /// Build a request, rejecting a blank URL.
    pub fn new(document: impl Into<String>) -> Result<Self, BillExtractError> {
        let document = document.into();
        if document.trim().is_empty() {
            return Err(BillExtractError::EmptyDocumentUrl);
        }
        Ok(Self { document })
    }
}

/// One billed service or medicine line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub item_name: String,
    /// Net amount: after discount, before any separately itemised tax.
    pub item_amount: f64,
    pub item_rate: f64,
    pub item_quantity: f64,
}

/// Classification of a bill page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PageType {
    #[serde(rename = "Bill Detail")]
    BillDetail,
    #[serde(rename = "Final Bill")]
    FinalBill,
    #[serde(rename = "Pharmacy")]
    Pharmacy,
    #[default]
    #[serde(rename = "Other")]
    Other,
}

impl PageType {
    /// Map a model-reported label onto the fixed enumeration.
    ///
    /// Matching is case-insensitive and tolerant of the "(Summary)" suffix
    /// the extraction prompt uses; anything unrecognised becomes `Other`.
    pub fn from_label(label: &str) -> Self {
        let normalised = label.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "bill detail" | "bill details" | "bill_detail" | "detail" => PageType::BillDetail,
            "final bill" | "final bill (summary)" | "final_bill" | "summary" => {
                PageType::FinalBill
            }
            "pharmacy" => PageType::Pharmacy,
            _ => PageType::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageType::BillDetail => "Bill Detail",
            PageType::FinalBill => "Final Bill",
            PageType::Pharmacy => "Pharmacy",
            PageType::Other => "Other",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line items found on one page, in extraction order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLineItems {
    /// Page label as reported by the model; not necessarily numeric.
    pub page_no: String,
    pub page_type: PageType,
    pub bill_items: Vec<BillItem>,
}

/// All extracted pages plus the locally computed item count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionData {
    pub pagewise_line_items: Vec<PageLineItems>,
    /// Always equal to the sum of `bill_items.len()` across pages.
    pub total_item_count: usize,
}

/// Token accounting for the model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Build usage from input/output counts; the total is their sum.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            total_tokens: input_tokens + output_tokens,
            input_tokens,
            output_tokens,
        }
    }
}

/// The uniform pipeline result.
///
/// Construct through [`ExtractionResponse::success`] or
/// [`ExtractionResponse::failure`]; they keep `data` and `error_message`
/// mutually exclusive and zero the usage on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub is_success: bool,
    pub token_usage: TokenUsage,
    pub data: Option<ExtractionData>,
    pub error_message: Option<String>,
}

impl ExtractionResponse {
    pub fn success(data: ExtractionData, token_usage: TokenUsage) -> Self {
        Self {
            is_success: true,
            token_usage,
            data: Some(data),
            error_message: None,
        }
    }

    pub fn failure(error: &BillExtractError) -> Self {
        Self {
            is_success: false,
            token_usage: TokenUsage::default(),
            data: None,
            error_message: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one_item_data() -> ExtractionData {
        ExtractionData {
            pagewise_line_items: vec![PageLineItems {
                page_no: "1".into(),
                page_type: PageType::BillDetail,
                bill_items: vec![BillItem {
                    item_name: "Bed Charges".into(),
                    item_amount: 500.0,
                    item_rate: 500.0,
                    item_quantity: 1.0,
                }],
            }],
            total_item_count: 1,
        }
    }

    #[test]
    fn request_rejects_blank_url() {
        assert!(matches!(
            ExtractionRequest::new("   "),
            Err(BillExtractError::EmptyDocumentUrl)
        ));
        assert!(ExtractionRequest::new("https://example.com/bill.pdf").is_ok());
    }

    #[test]
    fn page_type_labels() {
        assert_eq!(PageType::from_label("Bill Detail"), PageType::BillDetail);
        assert_eq!(PageType::from_label("final bill (Summary)"), PageType::FinalBill);
        assert_eq!(PageType::from_label("PHARMACY"), PageType::Pharmacy);
        assert_eq!(PageType::from_label("Discharge Summary Notes"), PageType::Other);
        assert_eq!(PageType::from_label(""), PageType::Other);
    }

    #[test]
    fn page_type_wire_names() {
        assert_eq!(
            serde_json::to_value(PageType::FinalBill).unwrap(),
            json!("Final Bill")
        );
        assert_eq!(PageType::BillDetail.to_string(), "Bill Detail");
    }

    #[test]
    fn success_serialises_with_null_error() {
        let resp = ExtractionResponse::success(one_item_data(), TokenUsage::new(1200, 80));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["is_success"], json!(true));
        assert_eq!(v["error_message"], json!(null));
        assert_eq!(v["token_usage"]["total_tokens"], json!(1280));
        assert_eq!(v["data"]["total_item_count"], json!(1));
        assert_eq!(
            v["data"]["pagewise_line_items"][0]["page_type"],
            json!("Bill Detail")
        );
    }

    #[test]
    fn failure_zeroes_usage_and_drops_data() {
        let err = BillExtractError::InvalidModelJson {
            detail: "EOF".into(),
        };
        let resp = ExtractionResponse::failure(&err);
        assert!(!resp.is_success);
        assert!(resp.data.is_none());
        assert_eq!(resp.token_usage, TokenUsage::default());
        assert!(resp
            .error_message
            .as_deref()
            .unwrap()
            .contains("invalid JSON"));

        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["data"], json!(null));
    }
}
