use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::events::{FetchOutcome, SearchLoop};
use super::SearchController;
use crate::config::ClientConfig;
use crate::error::{SearchError, SearchResult, TransportError};
use crate::model::{
    ConnectivityMonitor, MovieKind, Page, Query, ResultItem, SearchBackend, StateStore, UiState,
    WatchConnectivity,
};

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Long enough for a debounce window plus an instant reply
const SETTLE: Duration = Duration::from_secs(1);

struct Reply {
    delay: Duration,
    result: SearchResult<Page>,
}

#[derive(Clone, Debug)]
struct Call {
    query: Query,
    page: Option<u32>,
    cancelled: bool,
}

/// Backend replaying scripted replies in call order
#[derive(Default)]
struct FakeBackend {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    fn reply(self, result: SearchResult<Page>) -> Self {
        self.reply_after(Duration::ZERO, result)
    }

    fn reply_after(self, delay: Duration, result: SearchResult<Page>) -> Self {
        self.replies.lock().unwrap().push_back(Reply { delay, result });
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    async fn search(
        &self,
        query: &Query,
        page: Option<u32>,
        cancel: &CancellationToken,
    ) -> SearchResult<Page> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                query: query.clone(),
                page,
                cancelled: false,
            });
            calls.len() - 1
        };
        let Some(reply) = self.replies.lock().unwrap().pop_front() else {
            return Err(SearchError::Backend("no scripted reply".to_string()));
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                self.calls.lock().unwrap()[index].cancelled = true;
                Err(SearchError::Transport(TransportError::Cancelled))
            }
            _ = tokio::time::sleep(reply.delay) => reply.result,
        }
    }
}

fn items(prefix: &str, range: std::ops::Range<usize>) -> Vec<ResultItem> {
    range
        .map(|n| ResultItem {
            id: format!("{prefix}{n}"),
            title: format!("{prefix} {n}"),
            year: "2000".to_string(),
            poster_url: None,
            kind: MovieKind::Movie,
        })
        .collect()
}

fn page(prefix: &str, range: std::ops::Range<usize>, total_count: usize) -> SearchResult<Page> {
    Ok(Page {
        items: items(prefix, range),
        total_count,
    })
}

fn config() -> ClientConfig {
    ClientConfig {
        api_key: "test".to_string(),
        debounce: DEBOUNCE,
        ..ClientConfig::default()
    }
}

struct Harness {
    controller: SearchController,
    backend: Arc<FakeBackend>,
    network: Arc<WatchConnectivity>,
}

fn start(backend: FakeBackend) -> Harness {
    start_with_network(backend, true)
}

fn start_with_network(backend: FakeBackend, connected: bool) -> Harness {
    let backend = Arc::new(backend);
    let network = Arc::new(WatchConnectivity::new(connected));
    let controller = SearchController::spawn(&config(), backend.clone(), network.clone());
    Harness {
        controller,
        backend,
        network,
    }
}

async fn settle() {
    tokio::time::sleep(SETTLE).await;
}

fn result_ids(state: &UiState) -> Vec<String> {
    state
        .result()
        .map(|r| r.items.iter().map(|i| i.id.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn typing_is_debounced_into_one_fetch() {
    let h = start(FakeBackend::default().reply(page("bat", 0..10, 25)));

    for title in ["B", "Ba", "Bat", "Batman"] {
        h.controller.on_title_change(title);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    settle().await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].query, Query::new("Batman"));
    assert_eq!(calls[0].page, None);

    let state = h.controller.ui_state();
    let result = state.result().unwrap();
    assert_eq!(result.items.len(), 10);
    assert_eq!(result.total_count, 25);
    assert_eq!(result.query, Some(Query::new("Batman")));
}

#[tokio::test(start_paused = true)]
async fn no_fetch_before_quiet_period_ends() {
    let h = start(FakeBackend::default().reply(page("bat", 0..1, 1)));

    h.controller.on_title_change("Batman");
    tokio::time::sleep(DEBOUNCE - Duration::from_millis(10)).await;
    assert!(h.backend.calls().is_empty());

    settle().await;
    assert_eq!(h.backend.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn search_input_is_published_immediately() {
    let h = start(FakeBackend::default());
    let mut input = h.controller.subscribe_search_input();

    h.controller.on_title_change("Alien");
    let published = input.next_value().await.unwrap();
    assert_eq!(published.title, "Alien");
    assert!(h.backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn blank_title_never_reaches_backend() {
    let h = start(FakeBackend::default().reply(page("x", 0..1, 1)));

    h.controller.on_title_change("   ");
    settle().await;

    assert!(h.backend.calls().is_empty());
    assert_eq!(h.controller.ui_state(), UiState::empty());
}

#[tokio::test(start_paused = true)]
async fn offline_with_nothing_shown_is_an_error() {
    let h = start_with_network(FakeBackend::default().reply(page("x", 0..1, 1)), false);

    h.controller.on_title_change("Batman");
    settle().await;

    assert!(h.backend.calls().is_empty());
    assert_eq!(
        h.controller.ui_state(),
        UiState::Error("No network connection!".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn offline_keeps_loaded_results() {
    let h = start(FakeBackend::default().reply(page("bat", 0..10, 25)));

    h.controller.on_title_change("Batman");
    settle().await;
    let before = h.controller.ui_state();

    h.network.set_connected(false);
    settle().await;
    assert!(!h.controller.is_connected());

    h.controller.load_more();
    settle().await;

    assert_eq!(h.backend.calls().len(), 1);
    assert_eq!(h.controller.ui_state(), before);
}

#[tokio::test(start_paused = true)]
async fn connectivity_changes_are_published() {
    let h = start(FakeBackend::default());
    let mut connectivity = h.controller.subscribe_connectivity();
    assert!(h.controller.is_connected());

    h.network.set_connected(false);
    assert_eq!(connectivity.next_value().await, Some(false));
    h.network.set_connected(true);
    assert_eq!(connectivity.next_value().await, Some(true));
}

#[tokio::test(start_paused = true)]
async fn backend_message_is_shown_verbatim() {
    let h = start(
        FakeBackend::default().reply(Err(SearchError::Backend("Movie not found!".to_string()))),
    );

    h.controller.on_title_change("asdfasdf");
    settle().await;

    assert_eq!(
        h.controller.ui_state(),
        UiState::Error("Movie not found!".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_a_network_error() {
    let h = start(FakeBackend::default().reply(Err(SearchError::Transport(TransportError::Timeout))));

    h.controller.on_title_change("Batman");
    settle().await;

    assert_eq!(h.controller.ui_state(), UiState::Error("Network error".to_string()));
}

#[tokio::test(start_paused = true)]
async fn load_more_appends_the_next_page() {
    let h = start(
        FakeBackend::default()
            .reply(page("bat", 0..10, 25))
            .reply(page("bat", 10..20, 25))
            .reply(page("bat", 20..25, 25)),
    );

    h.controller.on_title_change("Batman");
    settle().await;
    h.controller.load_more();
    settle().await;

    let calls = h.backend.calls();
    assert_eq!(calls[1].page, Some(2));
    assert_eq!(calls[1].query, Query::new("Batman"));

    let ids = result_ids(&h.controller.ui_state());
    let expected: Vec<String> = (0..20).map(|n| format!("bat{n}")).collect();
    assert_eq!(ids, expected);

    h.controller.load_more();
    settle().await;
    assert_eq!(h.backend.calls()[2].page, Some(3));
    assert_eq!(result_ids(&h.controller.ui_state()).len(), 25);
}

#[tokio::test(start_paused = true)]
async fn complete_result_stops_fetching() {
    let h = start(FakeBackend::default().reply(page("alien", 0..3, 3)));

    h.controller.on_title_change("Alien");
    settle().await;
    h.controller.load_more();
    settle().await;

    assert_eq!(h.backend.calls().len(), 1);
    assert!(crate::model::pagination::is_complete(
        h.controller.ui_state().result().unwrap()
    ));
}

#[tokio::test(start_paused = true)]
async fn changed_query_starts_a_new_epoch() {
    let h = start(
        FakeBackend::default()
            .reply(page("bat", 0..10, 25))
            .reply(page("sup", 0..5, 5)),
    );

    h.controller.on_title_change("Batman");
    settle().await;
    h.controller.on_title_change("Superman");
    settle().await;

    let calls = h.backend.calls();
    assert_eq!(calls[1].page, None);

    let state = h.controller.ui_state();
    let result = state.result().unwrap();
    assert_eq!(result.query, Some(Query::new("Superman")));
    assert_eq!(result_ids(&state), (0..5).map(|n| format!("sup{n}")).collect::<Vec<_>>());
    assert_eq!(result.total_count, 5);
}

#[tokio::test(start_paused = true)]
async fn filters_are_part_of_the_query() {
    let h = start(
        FakeBackend::default()
            .reply(page("bat", 0..2, 2))
            .reply(page("bat-series", 0..1, 1))
            .reply(page("bat-all", 0..4, 4)),
    );

    h.controller.on_title_change("Batman");
    h.controller.on_year_change("1989");
    settle().await;
    h.controller.on_type_change(Some(MovieKind::Series));
    settle().await;
    h.controller.on_year_change("  ");
    h.controller.on_type_change(None);
    settle().await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].query, Query::new("Batman").with_year("1989"));
    assert_eq!(
        calls[1].query,
        Query::new("Batman")
            .with_year("1989")
            .with_kind(Some(MovieKind::Series))
    );
    assert_eq!(calls[2].query, Query::new("Batman"));
    assert_eq!(calls[2].query.year, None);
}

#[tokio::test(start_paused = true)]
async fn input_returning_to_the_same_query_is_not_refetched() {
    let h = start(FakeBackend::default().reply(page("bat", 0..10, 25)));

    h.controller.on_title_change("Batman");
    settle().await;
    h.controller.on_title_change("Batma");
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.controller.on_title_change("Batman");
    settle().await;

    assert_eq!(h.backend.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn new_query_cancels_the_running_fetch() {
    let h = start(
        FakeBackend::default()
            .reply_after(Duration::from_secs(5), page("bat", 0..10, 25))
            .reply(page("sup", 0..5, 5)),
    );
    let mut states = h.controller.subscribe_ui();

    h.controller.on_title_change("Batman");
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;
    assert_eq!(h.backend.calls().len(), 1);

    h.controller.on_title_change("Superman");
    tokio::time::sleep(Duration::from_secs(10)).await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].cancelled);

    let seen = states.drain();
    assert!(seen.iter().all(|s| !result_ids(s).iter().any(|id| id.starts_with("bat"))));
    assert_eq!(result_ids(&h.controller.ui_state()).len(), 5);
}

#[tokio::test(start_paused = true)]
async fn load_more_during_fetch_restarts_it() {
    let h = start(
        FakeBackend::default()
            .reply(page("bat", 0..10, 25))
            .reply_after(Duration::from_secs(5), page("stale", 0..10, 25))
            .reply(page("bat", 10..20, 25)),
    );

    h.controller.on_title_change("Batman");
    settle().await;
    h.controller.load_more();
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.controller.load_more();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[1].cancelled);
    assert_eq!(calls[2].page, Some(2));
    let ids = result_ids(&h.controller.ui_state());
    assert_eq!(ids.len(), 20);
    assert!(!ids.iter().any(|id| id.starts_with("stale")));
}

#[tokio::test(start_paused = true)]
async fn load_more_after_error_retries_the_input() {
    let h = start(
        FakeBackend::default()
            .reply(Err(SearchError::Transport(TransportError::Io("reset".to_string()))))
            .reply(page("bat", 0..10, 25)),
    );

    h.controller.on_title_change("Batman");
    settle().await;
    assert!(h.controller.ui_state().error_message().is_some());

    h.controller.load_more();
    settle().await;

    let calls = h.backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].page, None);
    assert_eq!(result_ids(&h.controller.ui_state()).len(), 10);
}

#[tokio::test(start_paused = true)]
async fn reset_clears_everything_and_cancels() {
    let h = start(
        FakeBackend::default()
            .reply_after(Duration::from_secs(5), page("bat", 0..10, 25))
            .reply(page("bat", 0..10, 25)),
    );

    h.controller.on_title_change("Batman");
    h.controller.on_year_change("2022");
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;
    h.controller.reset();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(h.backend.calls()[0].cancelled);
    assert_eq!(h.controller.ui_state(), UiState::empty());
    assert_eq!(h.controller.search_input(), Query::default());

    // the same query is searchable again after a reset
    h.controller.on_title_change("Batman");
    h.controller.on_year_change("2022");
    settle().await;
    assert_eq!(h.backend.calls().len(), 2);
    assert_eq!(result_ids(&h.controller.ui_state()).len(), 10);
}

#[tokio::test(start_paused = true)]
async fn reset_drops_a_pending_edit() {
    let h = start(FakeBackend::default().reply(page("bat", 0..1, 1)));

    h.controller.on_title_change("Batman");
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.controller.reset();
    settle().await;

    assert!(h.backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_last_handle_stops_the_loop() {
    let h = start(FakeBackend::default().reply_after(Duration::from_secs(5), page("bat", 0..1, 1)));

    h.controller.on_title_change("Batman");
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;
    let backend = h.backend.clone();
    drop(h);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(backend.calls()[0].cancelled);
}

#[tokio::test(start_paused = true)]
async fn shutdown_ignores_later_commands() {
    let h = start(FakeBackend::default().reply(page("bat", 0..1, 1)));

    h.controller.shutdown();
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.controller.on_title_change("Batman");
    settle().await;

    assert!(h.backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn going_offline_mid_fetch_lets_it_finish() {
    let h = start(FakeBackend::default().reply_after(Duration::from_secs(2), page("bat", 0..10, 25)));

    h.controller.on_title_change("Batman");
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;
    assert_eq!(h.backend.calls().len(), 1);

    h.network.set_connected(false);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!h.controller.is_connected());
    let calls = h.backend.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].cancelled);
    let state = h.controller.ui_state();
    assert_eq!(result_ids(&state).len(), 10);
    assert_eq!(state.result().unwrap().total_count, 25);
}

/// Reports online until someone subscribes, then offline
struct FlipOnSubscribe {
    connected: AtomicBool,
}

impl ConnectivityMonitor for FlipOnSubscribe {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn changes(&self) -> BoxStream<'static, bool> {
        // the flip happens before the returned stream can observe it
        self.connected.store(false, Ordering::SeqCst);
        futures::stream::pending::<bool>().boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn change_before_subscription_is_not_lost() {
    let monitor = Arc::new(FlipOnSubscribe {
        connected: AtomicBool::new(true),
    });
    let controller = SearchController::spawn(&config(), Arc::new(FakeBackend::default()), monitor);

    assert!(!controller.is_connected());
}

fn bare_loop(backend: Arc<FakeBackend>) -> SearchLoop {
    SearchLoop::new(
        &config(),
        backend,
        Arc::new(WatchConnectivity::new(true)),
        StateStore::new(UiState::empty()),
        StateStore::new(true),
        StateStore::new(Query::default()),
    )
}

#[tokio::test]
async fn outcome_of_an_unknown_fetch_is_discarded() {
    let mut search_loop = bare_loop(Arc::new(FakeBackend::default()));

    search_loop.apply_outcome(FetchOutcome {
        id: 42,
        query: Query::new("Batman"),
        result: page("bat", 0..10, 25),
    });

    assert_eq!(search_loop.ui_state.get(), UiState::empty());
}

#[tokio::test]
async fn over_reported_page_keeps_count_invariant() {
    let backend = Arc::new(FakeBackend::default().reply(page("bat", 0..10, 25)));
    let mut search_loop = bare_loop(backend);
    let query = Query::new("Batman");

    search_loop.evaluate(query.clone());
    let id = search_loop.in_flight.as_ref().map(|f| f.id).unwrap();
    search_loop.apply_outcome(FetchOutcome {
        id,
        query: query.clone(),
        result: page("bat", 0..12, 4),
    });

    let state = search_loop.ui_state.get();
    let result = state.result().unwrap();
    assert_eq!(result.items.len(), 12);
    assert_eq!(result.total_count, 12);
    assert!(result.belongs_to(&query));
    assert!(search_loop.in_flight.is_none());
}
