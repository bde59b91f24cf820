//! Controller module - search orchestration
//!
//! This module contains the search controller: it turns user-intent edits
//! into debounced, cancellable backend fetches and publishes one UI state.
//! It is organized into submodules by responsibility:
//!
//! - `input`: Intent commands sent from the UI to the event loop
//! - `events`: The event loop, the single place state is written from
//! - `search`: Evaluation guards, fetch start and page merging

mod events;
mod input;
mod search;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::model::{ConnectivityMonitor, Query, SearchBackend, StateStore, Subscription, UiState};

use events::SearchLoop;
use input::Command;

/// Handle to a running search controller.
///
/// Clones drive the same controller. The event loop stops, cancelling any
/// in-flight fetch, when [`SearchController::shutdown`] is called or the last
/// handle is dropped.
#[derive(Clone)]
pub struct SearchController {
    commands: mpsc::UnboundedSender<Command>,
    ui_state: StateStore<UiState>,
    connectivity: StateStore<bool>,
    search_input: StateStore<Query>,
    shutdown: CancellationToken,
}

impl SearchController {
    /// Start the event loop on the current tokio runtime
    pub fn spawn(
        config: &ClientConfig,
        backend: Arc<dyn SearchBackend>,
        monitor: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let ui_state = StateStore::new(UiState::empty());
        // the loop fills in the real snapshot once it has subscribed
        let connectivity = StateStore::new(false);
        let search_input = StateStore::new(Query::default());
        let shutdown = CancellationToken::new();

        let search_loop = SearchLoop::new(
            config,
            backend,
            monitor,
            ui_state.clone(),
            connectivity.clone(),
            search_input.clone(),
        );
        tokio::spawn(search_loop.run(command_rx, shutdown.clone()));

        tracing::info!(
            debounce_ms = config.debounce.as_millis() as u64,
            page_size = config.page_size,
            "Search controller started"
        );

        Self {
            commands,
            ui_state,
            connectivity,
            search_input,
            shutdown,
        }
    }

    /// Stop the event loop and cancel any in-flight fetch
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn ui_state(&self) -> UiState {
        self.ui_state.get()
    }

    pub fn subscribe_ui(&self) -> Subscription<UiState> {
        self.ui_state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.get()
    }

    pub fn subscribe_connectivity(&self) -> Subscription<bool> {
        self.connectivity.subscribe()
    }

    /// The not-yet-debounced input fields, as the UI last set them
    pub fn search_input(&self) -> Query {
        self.search_input.get()
    }

    pub fn subscribe_search_input(&self) -> Subscription<Query> {
        self.search_input.subscribe()
    }
}
