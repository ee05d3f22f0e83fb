//! Parse and validate the model's raw answer into typed pages.
//!
//! The model is asked for JSON-only output, but the text still crosses a
//! trust boundary, so this module turns it into either fully typed
//! [`PageLineItems`] or a named failure, never something half-typed:
//!
//! - not JSON at all → [`BillExtractError::InvalidModelJson`]
//! - JSON of the wrong shape → [`BillExtractError::SchemaViolation`]
//!
//! Normalisation applied while validating:
//!
//! 1. An outer ```` ```json ```` fence is stripped (chat providers without a
//!    JSON mode like to add one)
//! 2. `page_no` may be a string or a number; it is stored as a string
//! 3. `page_type` is mapped with [`PageType::from_label`]; unknown → `Other`
//! 4. Missing `pagewise_line_items` / `bill_items` mean "no items"
//! 5. Numbers may arrive as strings (`"1,250.00"`, `"₹ 500"`)
//! 6. Missing `item_quantity` → 1.0; missing `item_rate` → amount ÷ quantity
//!
//! A `total_item_count` in the model output is ignored; see
//! [`crate::pipeline::aggregate`].

use crate::error::BillExtractError;
use crate::output::{BillItem, PageLineItems, PageType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Quantity assumed when the document does not state one.
pub const DEFAULT_QUANTITY: f64 = 1.0;

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

static RE_GROUPED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d{1,3}(?:(?:,\d{3})+|(?:,\d{2})*,\d{3})(?:\.\d+)?$").unwrap()
});

/// Parse the model's raw text into validated, normalised pages.
pub fn parse_model_output(raw: &str) -> Result<Vec<PageLineItems>, BillExtractError> {
    let body = strip_code_fence(raw);
    let root: Value =
        serde_json::from_str(body).map_err(|e| BillExtractError::InvalidModelJson {
            detail: e.to_string(),
        })?;

    let pages = match &root {
        Value::Object(obj) => match obj.get("pagewise_line_items") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(pages)) => pages,
            Some(other) => {
                return Err(schema(format!(
                    "pagewise_line_items must be an array, got {}",
                    type_name(other)
                )))
            }
        },
        // Some models answer with the page array itself.
        Value::Array(pages) => pages,
        other => {
            return Err(schema(format!(
                "expected a JSON object, got {}",
                type_name(other)
            )))
        }
    };

    pages
        .iter()
        .enumerate()
        .map(|(idx, page)| parse_page(idx, page))
        .collect()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_JSON_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

fn parse_page(idx: usize, value: &Value) -> Result<PageLineItems, BillExtractError> {
    let path = format!("pagewise_line_items[{idx}]");
    let obj = as_object(&path, value)?;

    let page_no = match field(obj, "page_no") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => number_label(n),
        Some(other @ (Value::Bool(_) | Value::Array(_) | Value::Object(_))) => {
            return Err(schema(format!(
                "{path}.page_no must be a string or number, got {}",
                type_name(other)
            )))
        }
        _ => return Err(schema(format!("{path}.page_no is required"))),
    };

    let page_type = match field(obj, "page_type") {
        Some(Value::String(label)) => PageType::from_label(label),
        _ => PageType::Other,
    };

    let bill_items = match field(obj, "bill_items") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_item(&format!("{path}.bill_items[{i}]"), item))
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(schema(format!(
                "{path}.bill_items must be an array, got {}",
                type_name(other)
            )))
        }
    };

    Ok(PageLineItems {
        page_no,
        page_type,
        bill_items,
    })
}

fn parse_item(path: &str, value: &Value) -> Result<BillItem, BillExtractError> {
    let obj = as_object(path, value)?;

    let item_name = match field(obj, "item_name") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(schema(format!(
                "{path}.item_name must be a string, got {}",
                type_name(other)
            )))
        }
        None => return Err(schema(format!("{path}.item_name is required"))),
    };

    let item_amount = number(path, obj, "item_amount")?
        .ok_or_else(|| schema(format!("{path}.item_amount is required")))?;

    let item_quantity = number(path, obj, "item_quantity")?.unwrap_or(DEFAULT_QUANTITY);

    let item_rate = match number(path, obj, "item_rate")? {
        Some(rate) => rate,
        None if item_quantity != 0.0 => item_amount / item_quantity,
        None => item_amount,
    };

    Ok(BillItem {
        item_name,
        item_amount,
        item_rate,
        item_quantity,
    })
}

/// Look up a key, treating an explicit `null` as absent.
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn as_object<'a>(path: &str, value: &'a Value) -> Result<&'a Map<String, Value>, BillExtractError> {
    value
        .as_object()
        .ok_or_else(|| schema(format!("{path} must be an object, got {}", type_name(value))))
}

/// Read an optional numeric field, accepting numeric strings.
fn number(path: &str, obj: &Map<String, Value>, key: &str) -> Result<Option<f64>, BillExtractError> {
    let parsed = match field(obj, key) {
        None => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => parse_numeric_text(s),
        Some(_) => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(schema(format!("{path}.{key} must be a number"))),
    }
}

/// Commas are only accepted as digit grouping: Western (`1,250,000`) or
/// Indian (`12,50,000`). Anything else (`"1,5"`) is ambiguous and rejected.
fn parse_numeric_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches(|c: char| matches!(c, '₹' | '$' | '€' | '£') || c.is_whitespace())
        .trim_start_matches("Rs.")
        .trim_start_matches("INR")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.contains(',') && !RE_GROUPED_NUMBER.is_match(&cleaned) {
        return None;
    }
    cleaned.replace(',', "").parse().ok()
}

/// Render a JSON number as a page label: integers without a fraction.
fn number_label(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn schema(detail: String) -> BillExtractError {
    BillExtractError::SchemaViolation { detail }
}
