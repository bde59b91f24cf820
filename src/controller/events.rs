//! The controller's event loop.
//!
//! Every state transition happens on this one task: commands, debounce
//! deadlines, fetch completions and connectivity changes are handled one at a
//! time, so guards and the state they read can never interleave.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::SearchResult;
use crate::model::{
    normalize_year, ConnectivityMonitor, Page, Query, SearchBackend, StateStore, UiState,
};
use super::input::Command;

/// A fetch that has been started and not yet resolved
pub(super) struct InFlight {
    pub(super) id: u64,
    pub(super) token: CancellationToken,
    pub(super) query: Query,
    pub(super) page: Option<u32>,
}

/// Completion message sent back from a fetch task
pub(super) struct FetchOutcome {
    pub(super) id: u64,
    pub(super) query: Query,
    pub(super) result: SearchResult<Page>,
}

pub(super) struct SearchLoop {
    pub(super) debounce: Duration,
    pub(super) page_size: usize,
    pub(super) backend: Arc<dyn SearchBackend>,
    pub(super) monitor: Arc<dyn ConnectivityMonitor>,
    pub(super) ui_state: StateStore<UiState>,
    pub(super) connectivity: StateStore<bool>,
    pub(super) search_input: StateStore<Query>,
    /// When the pending edit becomes effective
    pub(super) debounce_deadline: Option<Instant>,
    /// Last debounced input that went through evaluation
    pub(super) last_evaluated: Option<Query>,
    pub(super) in_flight: Option<InFlight>,
    pub(super) next_fetch_id: u64,
    pub(super) outcomes_tx: mpsc::UnboundedSender<FetchOutcome>,
    outcomes_rx: Option<mpsc::UnboundedReceiver<FetchOutcome>>,
    connectivity_changes: Option<BoxStream<'static, bool>>,
}

impl SearchLoop {
    pub(super) fn new(
        config: &ClientConfig,
        backend: Arc<dyn SearchBackend>,
        monitor: Arc<dyn ConnectivityMonitor>,
        ui_state: StateStore<UiState>,
        connectivity: StateStore<bool>,
        search_input: StateStore<Query>,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        // subscribe before taking the snapshot so no change falls in between
        let connectivity_changes = monitor.changes();
        connectivity.set(monitor.is_connected());
        Self {
            debounce: config.debounce,
            page_size: config.page_size,
            backend,
            monitor,
            ui_state,
            connectivity,
            search_input,
            debounce_deadline: None,
            last_evaluated: None,
            in_flight: None,
            next_fetch_id: 0,
            outcomes_tx,
            outcomes_rx: Some(outcomes_rx),
            connectivity_changes: Some(connectivity_changes),
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) {
        let (Some(mut outcomes), Some(changes)) =
            (self.outcomes_rx.take(), self.connectivity_changes.take())
        else {
            return;
        };
        let mut connectivity_changes = changes.fuse();

        loop {
            let deadline = self.debounce_deadline;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(outcome) = outcomes.recv() => self.apply_outcome(outcome),
                Some(connected) = connectivity_changes.next() => self.on_connectivity_changed(connected),
                _ = wait_until(deadline) => {
                    self.debounce_deadline = None;
                    self.on_debounce_elapsed();
                }
            }
        }

        self.cancel_in_flight();
        tracing::info!("Search controller stopped");
    }

    pub(super) fn handle_command(&mut self, command: Command) {
        match command {
            Command::TitleChanged(title) => {
                self.edit_input(|input| input.title = title);
            }
            Command::YearChanged(year) => {
                let year = normalize_year(year);
                self.edit_input(|input| input.year = year);
            }
            Command::KindChanged(kind) => {
                self.edit_input(|input| input.kind = kind);
            }
            Command::LoadMore => self.load_more(),
            Command::Reset => self.reset(),
        }
    }

    /// Apply an edit and restart the quiet period
    fn edit_input(&mut self, edit: impl FnOnce(&mut Query)) {
        self.search_input.update(|current| {
            let mut next = current.clone();
            edit(&mut next);
            next
        });
        self.debounce_deadline = Some(Instant::now() + self.debounce);
    }

    pub(super) fn on_debounce_elapsed(&mut self) {
        let query = self.search_input.get();
        if self.last_evaluated.as_ref() == Some(&query) {
            tracing::trace!(title = %query.title, "Debounced input unchanged, skipping");
            return;
        }
        self.last_evaluated = Some(query.clone());
        tracing::debug!(title = %query.title, year = ?query.year, kind = ?query.kind, "Debounced query");
        self.evaluate(query);
    }

    fn load_more(&mut self) {
        // the query the current results belong to, else what the UI holds
        let query = self
            .ui_state
            .with(|state| state.result().and_then(|result| result.query.clone()))
            .unwrap_or_else(|| self.search_input.get());
        tracing::debug!(title = %query.title, "Load more requested");
        self.evaluate(query);
    }

    fn reset(&mut self) {
        tracing::info!("Resetting search");
        self.cancel_in_flight();
        self.debounce_deadline = None;
        self.last_evaluated = None;
        self.search_input.set(Query::default());
        self.ui_state.set(UiState::empty());
    }

    pub(super) fn on_connectivity_changed(&mut self, connected: bool) {
        // gates new fetches only; an in-flight fetch runs to completion
        tracing::info!(connected, in_flight = self.in_flight.is_some(), "Connectivity update");
        self.connectivity.set(connected);
    }

    pub(super) fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!(
                fetch_id = in_flight.id,
                title = %in_flight.query.title,
                page = ?in_flight.page,
                "Cancelling in-flight fetch"
            );
            in_flight.token.cancel();
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
