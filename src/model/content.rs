//! Search result data: single items, backend pages and the accumulated result

use super::types::{MovieKind, Query};

/// Poster value the backend sends when there is no image
pub const POSTER_UNAVAILABLE: &str = "N/A";

/// One title from the search results
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultItem {
    pub id: String,
    pub title: String,
    pub year: String,
    pub poster_url: Option<String>,
    pub kind: MovieKind,
}

impl ResultItem {
    /// Poster URL, or `None` when the backend has none
    pub fn poster(&self) -> Option<&str> {
        self.poster_url
            .as_deref()
            .filter(|url| !url.is_empty() && *url != POSTER_UNAVAILABLE)
    }
}

/// One page returned by a single backend call
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<ResultItem>,
    pub total_count: usize,
}

/// Every page fetched so far for one query epoch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccumulatedResult {
    pub items: Vec<ResultItem>,
    pub total_count: usize,
    /// `None` only for the initial/reset state
    pub query: Option<Query>,
}

impl AccumulatedResult {
    /// Empty result bound to a new query, used at the start of an epoch
    pub fn for_query(query: Query) -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            query: Some(query),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn belongs_to(&self, query: &Query) -> bool {
        self.query.as_ref() == Some(query)
    }
}
