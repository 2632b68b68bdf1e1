//! In-memory backend that records every attempt.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::protocol::{FilterOptions, SearchResult};

use crate::{FetchError, FetchResult, NormalizedQuery, SalesBackend};

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub latency: Duration,
    searches: Mutex<Vec<NormalizedQuery>>,
    option_calls: AtomicU32,
    search_failures: Mutex<VecDeque<FetchError>>,
    options_failures: Mutex<VecDeque<FetchError>>,
}

impl FakeBackend {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Queues errors returned by the next search attempts, in order.
    pub(crate) fn fail_searches(&self, errors: impl IntoIterator<Item = FetchError>) {
        self.search_failures
            .lock()
            .expect("failures lock")
            .extend(errors);
    }

    pub(crate) fn fail_options(&self, errors: impl IntoIterator<Item = FetchError>) {
        self.options_failures
            .lock()
            .expect("failures lock")
            .extend(errors);
    }

    pub(crate) fn search_calls(&self) -> Vec<NormalizedQuery> {
        self.searches.lock().expect("searches lock").clone()
    }

    pub(crate) fn search_count(&self) -> usize {
        self.searches.lock().expect("searches lock").len()
    }

    pub(crate) fn options_count(&self) -> u32 {
        self.option_calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn sample_options() -> FilterOptions {
    FilterOptions {
        customer_regions: vec!["East".into(), "North".into()],
        genders: vec!["Female".into(), "Male".into()],
        product_categories: vec!["Electronics".into(), "Home".into()],
        payment_methods: vec!["Cash".into(), "UPI".into()],
        tags: vec!["gift".into(), "sale".into()],
    }
}

pub(crate) fn page_for(query: &NormalizedQuery) -> SearchResult {
    let page = query
        .get("page")
        .and_then(|value| value.as_u64())
        .unwrap_or(1) as u32;
    SearchResult {
        items: Vec::new(),
        total_count: 42,
        page,
        page_size: 10,
        total_pages: 5,
        has_next: page < 5,
        has_previous: page > 1,
    }
}

#[async_trait]
impl SalesBackend for FakeBackend {
    async fn filter_options(&self) -> FetchResult<FilterOptions> {
        self.option_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failure = self.options_failures.lock().expect("failures lock").pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(sample_options()),
        }
    }

    async fn search(&self, query: &NormalizedQuery) -> FetchResult<SearchResult> {
        self.searches
            .lock()
            .expect("searches lock")
            .push(query.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failure = self.search_failures.lock().expect("failures lock").pop_front();
        match failure {
            Some(err) => Err(err),
            None => Ok(page_for(query)),
        }
    }
}
