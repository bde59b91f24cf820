//! Evaluation guards, fetch start and page merging

use tracing::Instrument;
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::model::pagination::{is_complete, merge, next_page};
use crate::model::{AccumulatedResult, Page, Query, ResultItem, UiState};

use super::events::{FetchOutcome, InFlight, SearchLoop};

impl SearchLoop {
    /// Run the guards for `query` and start the next page fetch if they pass.
    ///
    /// Any fetch already in flight is cancelled first, whether or not a new
    /// one starts.
    pub(super) fn evaluate(&mut self, query: Query) {
        self.cancel_in_flight();

        if query.is_blank() {
            tracing::debug!("Blank title, nothing to search");
            return;
        }

        if !self.monitor.is_connected() {
            // keep whatever is already on screen; only an empty screen gets the error
            let showing_nothing = self
                .ui_state
                .with(|state| state.result().is_some_and(AccumulatedResult::is_empty));
            if showing_nothing {
                self.ui_state
                    .set(UiState::Error(SearchError::NoConnectivity.user_message()));
            }
            tracing::info!(title = %query.title, "Offline, search skipped");
            return;
        }

        self.ui_state.update(|state| match state {
            UiState::Success(result) if result.belongs_to(&query) => state.clone(),
            _ => {
                tracing::debug!(title = %query.title, "New query, starting from an empty result");
                UiState::Success(AccumulatedResult::for_query(query.clone()))
            }
        });

        let (complete, page) = self.ui_state.with(|state| match state.result() {
            Some(result) => (
                is_complete(result),
                next_page(result.items.len(), result.total_count, self.page_size),
            ),
            None => (false, None),
        });
        if complete {
            tracing::debug!(title = %query.title, "All results loaded");
            return;
        }

        self.start_fetch(query, page);
    }

    fn start_fetch(&mut self, query: Query, page: Option<u32>) {
        self.next_fetch_id += 1;
        let id = self.next_fetch_id;
        let token = CancellationToken::new();

        let backend = self.backend.clone();
        let outcomes = self.outcomes_tx.clone();
        let task_token = token.clone();
        let task_query = query.clone();
        let span = tracing::debug_span!("fetch", fetch_id = id, title = %query.title, page = ?page);

        tokio::spawn(
            async move {
                // the backend owns cancellation; a cancelled call ends in TransportError::Cancelled
                let result = backend.search(&task_query, page, &task_token).await;
                // the loop may already be gone
                let _ = outcomes.send(FetchOutcome {
                    id,
                    query: task_query,
                    result,
                });
            }
            .instrument(span),
        );

        tracing::debug!(fetch_id = id, title = %query.title, page = ?page, "Fetch started");
        self.in_flight = Some(InFlight {
            id,
            token,
            query,
            page,
        });
    }

    pub(super) fn apply_outcome(&mut self, outcome: FetchOutcome) {
        let Some(in_flight) = self.in_flight.take_if(|f| f.id == outcome.id) else {
            tracing::debug!(fetch_id = outcome.id, "Discarding stale fetch outcome");
            return;
        };
        if in_flight.token.is_cancelled() {
            tracing::debug!(fetch_id = outcome.id, "Discarding outcome of cancelled fetch");
            return;
        }

        match outcome.result {
            Ok(Page {
                items: incoming,
                total_count: reported_total,
            }) => {
                let query = outcome.query;
                let fetched = incoming.len();
                self.ui_state.update(move |state| {
                    let existing: &[ResultItem] = match state.result() {
                        Some(result) if result.belongs_to(&query) => result.items.as_slice(),
                        _ => &[],
                    };
                    let items = merge(existing, incoming);
                    let total_count = if items.len() > reported_total {
                        tracing::warn!(
                            loaded = items.len(),
                            reported_total,
                            "Backend reported fewer results than already loaded"
                        );
                        items.len()
                    } else {
                        reported_total
                    };
                    UiState::Success(AccumulatedResult {
                        items,
                        total_count,
                        query: Some(query),
                    })
                });
                tracing::info!(
                    fetch_id = outcome.id,
                    fetched,
                    total = reported_total,
                    "Page merged"
                );
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                tracing::warn!(fetch_id = outcome.id, error = %e, "Search failed");
                self.ui_state.set(UiState::Error(e.user_message()));
            }
        }
    }
}
