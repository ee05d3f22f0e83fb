//! Pipeline stages for bill extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own. The model call sits between `fetch` and `parse` and lives in
//! [`crate::model`] because it is the pluggable part.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ model ──▶ parse ──▶ aggregate
//! (URL)    (upload +   (JSON →    (recount
//!           generate)   pages)     items)
//! ```
//!
//! 1. [`fetch`]    : stream the document URL into a self-deleting scratch file
//! 2. [`parse`]    : validate the model's JSON and fill in defaulted fields
//! 3. [`aggregate`]: attach the locally computed item total

pub mod aggregate;
pub mod fetch;
pub mod parse;
