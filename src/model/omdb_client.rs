//! OMDb search backend on top of the retrying transport

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::content::{Page, ResultItem};
use super::transport::{HttpExchange, HttpRequest, RetryingTransport};
use super::types::{MovieKind, Query};
use crate::error::{SearchError, SearchResult, TransportError, UNKNOWN_ERROR_MESSAGE};

/// Given a query and a page cursor, returns one page of results
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// `page` is 1-based; `None` lets the backend use its first page.
    async fn search(
        &self,
        query: &Query,
        page: Option<u32>,
        cancel: &CancellationToken,
    ) -> SearchResult<Page>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Search", default)]
    search: Option<Vec<MovieData>>,
    #[serde(rename = "totalResults", default)]
    total_results: Option<String>,
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieData {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year")]
    year: String,
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Type")]
    kind: MovieKind,
    #[serde(rename = "Poster", default)]
    poster: Option<String>,
}

impl From<MovieData> for ResultItem {
    fn from(movie: MovieData) -> Self {
        ResultItem {
            id: movie.imdb_id,
            title: movie.title,
            year: movie.year,
            poster_url: movie.poster,
            kind: movie.kind,
        }
    }
}

/// Turn a response body into a page or the backend's own failure
fn decode_page(body: &str) -> SearchResult<Page> {
    let response: SearchResponse = serde_json::from_str(body)?;

    if response.response != "True" {
        let message = response
            .error
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());
        return Err(SearchError::Backend(message));
    }

    let total_count = response
        .total_results
        .and_then(|total| total.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let items = response
        .search
        .unwrap_or_default()
        .into_iter()
        .map(ResultItem::from)
        .collect();

    Ok(Page { items, total_count })
}

/// OMDb HTTP client
pub struct OmdbClient<E> {
    base_url: String,
    transport: RetryingTransport<E>,
}

impl<E: HttpExchange> OmdbClient<E> {
    pub fn new(base_url: impl Into<String>, transport: RetryingTransport<E>) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    /// Wire request for one page; absent filters are left out
    pub fn build_request(&self, query: &Query, page: Option<u32>) -> HttpRequest {
        let mut request = HttpRequest::get(self.base_url.clone()).param("s", query.title.trim());
        if let Some(year) = &query.year {
            request = request.param("y", year.clone());
        }
        if let Some(page) = page {
            request = request.param("page", page.to_string());
        }
        if let Some(kind) = query.kind {
            request = request.param("type", kind.wire_value());
        }
        request
    }
}

#[async_trait]
impl<E: HttpExchange> SearchBackend for OmdbClient<E> {
    async fn search(
        &self,
        query: &Query,
        page: Option<u32>,
        cancel: &CancellationToken,
    ) -> SearchResult<Page> {
        if query.is_blank() {
            return Err(SearchError::InvalidRequest("search title is blank".to_string()));
        }

        crate::log_api_request!(
            "search",
            title = %query.title,
            year = ?query.year,
            kind = ?query.kind,
            page = ?page
        );

        let request = self.build_request(query, page);
        let started = tokio::time::Instant::now();
        let result: SearchResult<Page> = async {
            let response = self.transport.execute(&request, cancel).await?;
            if !response.is_success() {
                return Err(SearchError::Transport(TransportError::Status {
                    status: response.status,
                    retry_after: response.retry_after,
                }));
            }
            decode_page(&response.body)
        }
        .await;

        if !matches!(&result, Err(e) if e.is_cancelled()) {
            crate::log_api_result!("search", result, started);
        }
        result
    }
}
