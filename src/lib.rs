//! Debounced, paginated movie search against the OMDb API.
//!
//! The [`SearchController`] turns edits of a title, year and kind filter into
//! cancellable page fetches and publishes a single [`UiState`].

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;

pub use config::{ClientConfig, RetryPolicy};
pub use controller::SearchController;
pub use error::{ConfigError, SearchError, SearchResult, TransportError};
pub use model::{
    AccumulatedResult, ConnectivityMonitor, MovieKind, OmdbClient, Page, Query, ResultItem,
    SearchBackend, UiState,
};
