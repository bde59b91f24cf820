//! Model module - search data, state containers and the search backend
//!
//! This module contains the data structures and the I/O collaborators the
//! controller depends on. It is organized into submodules by responsibility:
//!
//! - `types`: Core type definitions (movie kinds, queries, UI state)
//! - `content`: Result items, backend pages and the accumulated result
//! - `pagination`: Page-cursor arithmetic and result merging
//! - `store`: Observable value container for published state
//! - `connectivity`: Network reachability monitors
//! - `transport`: Retrying HTTP transport
//! - `omdb_client`: OMDb search backend

mod types;
mod content;
mod store;
mod connectivity;
mod omdb_client;
pub mod pagination;
pub mod transport;

// Re-export all public types for convenient access
pub use types::{MovieKind, Query, UiState, UnknownMovieKind};
pub(crate) use types::normalize_year;

pub use content::{AccumulatedResult, Page, ResultItem, POSTER_UNAVAILABLE};

pub use store::{StateStore, Subscription};

pub use connectivity::{
    probe_address, ConnectivityMonitor, ProbeConnectivity, WatchConnectivity, PROBE_INTERVAL,
};

pub use transport::{HttpExchange, HttpRequest, HttpResponse, ReqwestExchange, RetryingTransport};

pub use omdb_client::{OmdbClient, SearchBackend};
