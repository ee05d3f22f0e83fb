//! Assemble validated pages into [`ExtractionData`].
//!
//! The item count is always derived here from the pages themselves. The
//! model is never asked for it and, if it volunteers one, the parser drops it.

use crate::output::{ExtractionData, PageLineItems};

/// Number of bill items across all pages.
pub fn count_items(pages: &[PageLineItems]) -> usize {
    pages.iter().map(|p| p.bill_items.len()).sum()
}

/// Wrap the pages with their recomputed total.
pub fn aggregate(pages: Vec<PageLineItems>) -> ExtractionData {
    let total_item_count = count_items(&pages);
    ExtractionData {
        pagewise_line_items: pages,
        total_item_count,
    }
}
