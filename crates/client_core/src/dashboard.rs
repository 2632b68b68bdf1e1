//! Session state consumed by a presentation layer.
//!
//! A [`Dashboard`] owns the [`QueryState`], forwards every mutation to a
//! refresh, and receives fetch completions and debounced search commits as
//! [`DashboardEvent`]s on a single channel. Handling events one at a time
//! keeps all state changes on the caller's task.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use shared::protocol::{FilterOptions, SearchResult};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    config::ClientSettings,
    debounce::{Debouncer, DEFAULT_DEBOUNCE},
    error::{FetchError, FetchResult},
    normalize::{NormalizedQuery, QueryKey},
    query_state::QueryState,
    SalesClient,
};

#[derive(Debug, Clone)]
pub enum DashboardEvent {
    /// Debounced search text. `generation` ties the commit to the keystroke
    /// that produced it; commits older than the latest input are dropped.
    SearchCommitted { generation: u64, text: String },
    SearchLoaded {
        key: QueryKey,
        outcome: FetchResult<Arc<SearchResult>>,
    },
    OptionsLoaded(FetchResult<Arc<FilterOptions>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(FetchError),
}

impl FetchStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

pub struct Dashboard {
    client: Arc<SalesClient>,
    query: QueryState,
    search_input: Debouncer<DashboardEvent>,
    search_generation: u64,
    events_tx: mpsc::UnboundedSender<DashboardEvent>,
    events_rx: mpsc::UnboundedReceiver<DashboardEvent>,
    pending_key: Option<QueryKey>,
    results: Option<(QueryKey, Arc<SearchResult>)>,
    search_status: FetchStatus,
    options: Option<Arc<FilterOptions>>,
    options_status: FetchStatus,
}

impl Dashboard {
    pub fn new(client: Arc<SalesClient>) -> Self {
        Self::with_query(client, QueryState::default(), DEFAULT_DEBOUNCE)
    }

    pub fn from_settings(client: Arc<SalesClient>, settings: &ClientSettings) -> Self {
        Self::with_query(
            client,
            QueryState::with_page_size(settings.page_size),
            settings.debounce,
        )
    }

    pub fn with_query(client: Arc<SalesClient>, query: QueryState, debounce: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            query,
            search_input: Debouncer::new(debounce, events_tx.clone()),
            search_generation: 0,
            events_tx,
            events_rx,
            pending_key: None,
            results: None,
            search_status: FetchStatus::Idle,
            options: None,
            options_status: FetchStatus::Idle,
        }
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn current_key(&self) -> QueryKey {
        NormalizedQuery::from_state(&self.query).key()
    }

    /// Latest page, only when it was produced by the current query.
    pub fn results(&self) -> Option<&Arc<SearchResult>> {
        let current = self.current_key();
        self.results
            .as_ref()
            .filter(|(key, _)| *key == current)
            .map(|(_, result)| result)
    }

    pub fn filter_options(&self) -> Option<&Arc<FilterOptions>> {
        self.options.as_ref()
    }

    pub fn search_status(&self) -> &FetchStatus {
        &self.search_status
    }

    pub fn options_status(&self) -> &FetchStatus {
        &self.options_status
    }

    pub fn is_loading(&self) -> bool {
        self.search_status.is_loading() || self.options_status.is_loading()
    }

    pub fn is_search_pending(&self) -> bool {
        self.search_input.is_pending()
    }

    /// Applies a container mutation and refreshes results for the new query.
    pub fn update(&mut self, mutate: impl FnOnce(&mut QueryState)) {
        mutate(&mut self.query);
        self.refresh();
    }

    pub fn set_page(&mut self, page: u32) {
        self.update(|query| query.set_page(page));
    }

    pub fn reset(&mut self) {
        self.discard_search_input();
        self.update(QueryState::reset);
    }

    /// Records a keystroke. The text is committed to the query only after
    /// the debounce window passes without further input.
    pub fn type_search(&mut self, text: impl Into<String>) {
        self.search_generation += 1;
        self.search_input.push(DashboardEvent::SearchCommitted {
            generation: self.search_generation,
            text: text.into(),
        });
    }

    /// Clears the search text immediately, dropping any pending keystrokes.
    pub fn clear_search(&mut self) {
        self.discard_search_input();
        self.commit_search(String::new());
    }

    /// Re-requests the current query. Failed outcomes are never cached, so
    /// this reaches the network after an error.
    pub fn retry(&mut self) {
        self.refresh();
        if matches!(self.options_status, FetchStatus::Failed(_)) {
            self.load_filter_options();
        }
    }

    pub fn refresh(&mut self) {
        let query = NormalizedQuery::from_state(&self.query);
        let key = query.key();
        if self.pending_key.as_ref() == Some(&key) {
            debug!(key = %key, "search: request for current query already pending");
            return;
        }

        self.pending_key = Some(key.clone());
        self.search_status = FetchStatus::Loading;
        let client = Arc::clone(&self.client);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = client.search_transactions(&query).await;
            let _ = tx.send(DashboardEvent::SearchLoaded { key, outcome });
        });
    }

    pub fn load_filter_options(&mut self) {
        if self.options_status.is_loading() {
            return;
        }
        self.options_status = FetchStatus::Loading;
        let client = Arc::clone(&self.client);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = client.fetch_filter_options().await;
            let _ = tx.send(DashboardEvent::OptionsLoaded(outcome));
        });
    }

    pub async fn next_event(&mut self) -> Option<DashboardEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::SearchCommitted { generation, text } => {
                if generation == self.search_generation {
                    self.commit_search(text);
                } else {
                    debug!(generation, "search: dropping superseded commit");
                }
            }
            DashboardEvent::SearchLoaded { key, outcome } => self.apply_search(key, outcome),
            DashboardEvent::OptionsLoaded(outcome) => match outcome {
                Ok(options) => {
                    self.options = Some(options);
                    self.options_status = FetchStatus::Ready;
                }
                Err(err) => {
                    warn!(kind = err.kind(), "options: load failed: {err}");
                    self.options = None;
                    self.options_status = FetchStatus::Failed(err);
                }
            },
        }
    }

    /// Waits for the next event and applies it.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Pumps events until the current query has settled.
    pub async fn wait_for_results(&mut self) -> FetchResult<Arc<SearchResult>> {
        loop {
            if !self.search_status.is_loading() && !self.search_input.is_pending() {
                if let Some(result) = self.results() {
                    return Ok(Arc::clone(result));
                }
                if let FetchStatus::Failed(err) = &self.search_status {
                    return Err(err.clone());
                }
                self.refresh();
            }
            if !self.pump().await {
                return Err(FetchError::Network("dashboard event channel closed".into()));
            }
        }
    }

    pub async fn wait_for_filter_options(&mut self) -> FetchResult<Arc<FilterOptions>> {
        if matches!(self.options_status, FetchStatus::Idle) {
            self.load_filter_options();
        }
        loop {
            match &self.options_status {
                FetchStatus::Ready => {
                    if let Some(options) = &self.options {
                        return Ok(Arc::clone(options));
                    }
                }
                FetchStatus::Failed(err) => return Err(err.clone()),
                FetchStatus::Idle | FetchStatus::Loading => {}
            }
            if !self.pump().await {
                return Err(FetchError::Network("dashboard event channel closed".into()));
            }
        }
    }

    /// Cancels the debounce timer and invalidates any commit it already sent.
    fn discard_search_input(&mut self) {
        self.search_input.cancel();
        self.search_generation += 1;
    }

    fn commit_search(&mut self, text: String) {
        if self.query.search_query().unwrap_or_default() == text {
            debug!("search: committed text unchanged");
            return;
        }
        info!(query = %text, "search: committing search text");
        self.update(|query| query.set_search_query(text));
    }

    fn apply_search(&mut self, key: QueryKey, outcome: FetchResult<Arc<SearchResult>>) {
        if self.pending_key.as_ref() == Some(&key) {
            self.pending_key = None;
        }
        if key != self.current_key() {
            debug!(key = %key, "search: discarding response for superseded query");
            return;
        }

        match outcome {
            Ok(result) => {
                debug!(
                    key = %key,
                    total_count = result.total_count,
                    page = result.page,
                    "search: results applied"
                );
                self.results = Some((key, result));
                self.search_status = FetchStatus::Ready;
            }
            Err(err) => {
                warn!(key = %key, kind = err.kind(), "search: request failed: {err}");
                self.results = None;
                self.search_status = FetchStatus::Failed(err);
            }
        }
    }
}

/// Full selection after toggling `value`: removed when present, added
/// otherwise. Multi-select setters take the complete set.
pub fn toggle_member(current: Option<&BTreeSet<String>>, value: &str) -> BTreeSet<String> {
    let mut next = current.cloned().unwrap_or_default();
    if !next.remove(value) {
        next.insert(value.to_string());
    }
    next
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
