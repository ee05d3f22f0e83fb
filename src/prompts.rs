//! The extraction instruction sent to the model with every document.
//!
//! The parser in [`crate::pipeline::parse`] relies on the output shape and
//! field names described here, so the prompt is not configurable. Item
//! counts and defaulted fields are still re-derived by the parser.

/// Instruction prompt for line-item extraction.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert medical bill auditor. Extract the billed line items from the attached invoice document into JSON.

CRITICAL EXTRACTION RULES:

1. PAGE TYPE
   - Classify every page as exactly one of: "Bill Detail", "Final Bill" (the summary page), or "Pharmacy".

2. NO DOUBLE COUNTING
   - Do NOT extract "Total", "Subtotal", "Balance Due" or "Amount Paid" lines as bill items.
   - Only extract the individual services and medicines that are listed.

3. DATA PRECISION
   - item_amount: the NET amount (after discount, before tax if tax is split out).
   - item_quantity: if missing on the document, use 1.0.
   - item_rate: if missing on the document, infer it as item_amount / item_quantity.

4. OUTPUT FORMAT
   - Return a single JSON object and nothing else, shaped exactly like this:

{
  "pagewise_line_items": [
    {
      "page_no": "1",
      "page_type": "Bill Detail",
      "bill_items": [
        {
          "item_name": "Bed Charges",
          "item_amount": 500.0,
          "item_rate": 500.0,
          "item_quantity": 1.0
        }
      ]
    }
  ]
}"#;

/// User-turn text accompanying the document for chat-style providers.
pub const DOCUMENT_TURN_TEXT: &str = "Extract the bill line items from this document.";
