//! Page-cursor arithmetic and result merging

use super::content::{AccumulatedResult, ResultItem};

/// Next 1-based page to request, or `None` once everything is loaded.
///
/// `None` for `(0, 0)` means "first call, no page parameter".
pub fn next_page(current_count: usize, total_count: usize, page_size: usize) -> Option<u32> {
    if current_count >= total_count || page_size == 0 {
        return None;
    }
    u32::try_from(current_count / page_size).ok()?.checked_add(1)
}

/// Append a new page after the existing items, preserving order.
///
/// Items are not deduplicated by id.
pub fn merge(existing: &[ResultItem], incoming: Vec<ResultItem>) -> Vec<ResultItem> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    merged.extend_from_slice(existing);
    merged.extend(incoming);
    merged
}

/// True once every result of a non-empty search is loaded
pub fn is_complete(result: &AccumulatedResult) -> bool {
    result.items.len() == result.total_count && result.total_count != 0
}
