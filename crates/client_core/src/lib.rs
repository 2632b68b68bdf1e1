use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    error::ApiErrorBody,
    protocol::{FilterOptions, SearchResult},
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod debounce;
pub mod error;
pub mod format;
pub mod normalize;
pub mod pagination;
pub mod query_state;
pub mod retry;

pub use cache::{CacheLookup, CachePolicy};
pub use config::{load_settings, ClientSettings};
pub use dashboard::{toggle_member, Dashboard, DashboardEvent, FetchStatus};
pub use error::{FetchError, FetchResult};
pub use normalize::{NormalizedQuery, QueryKey};
pub use query_state::QueryState;
pub use retry::RetryPolicy;

use cache::QueryStore;
use retry::with_retry;

pub const FILTER_OPTIONS_PATH: &str = "/api/sales/filter-options";
pub const SEARCH_PATH: &str = "/api/sales/search";
const FILTER_OPTIONS_KEY: &str = "filter-options";
const SEARCH_RETRIES: u32 = 2;
const FILTER_OPTIONS_RETRIES: u32 = 3;

/// Transport to the sales backend. One call is one network attempt; retry
/// and caching live in [`SalesClient`].
#[async_trait]
pub trait SalesBackend: Send + Sync {
    async fn filter_options(&self) -> FetchResult<FilterOptions>;
    async fn search(&self, query: &NormalizedQuery) -> FetchResult<SearchResult>;
}

pub struct HttpSalesBackend {
    http: Client,
    base_url: String,
}

impl HttpSalesBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> FetchResult<T> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::Network(format!("failed to read response body: {err}")))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .map(|error| error.message())
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
            return Err(FetchError::Server {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|err| FetchError::Decode(err.to_string()))
    }
}

#[async_trait]
impl SalesBackend for HttpSalesBackend {
    async fn filter_options(&self) -> FetchResult<FilterOptions> {
        let url = format!("{}{FILTER_OPTIONS_PATH}", self.base_url);
        debug!(%url, "options: GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;
        Self::read_json(response).await
    }

    async fn search(&self, query: &NormalizedQuery) -> FetchResult<SearchResult> {
        let url = format!("{}{SEARCH_PATH}", self.base_url);
        debug!(%url, key = %query.key(), "search: POST");
        let response = self
            .http
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;
        Self::read_json(response).await
    }
}

/// Cache and retry settings for both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientPolicy {
    pub search_cache: CachePolicy,
    pub search_retry: RetryPolicy,
    pub options_cache: CachePolicy,
    pub options_retry: RetryPolicy,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            search_cache: CachePolicy::search_default(),
            search_retry: RetryPolicy::new(SEARCH_RETRIES),
            options_cache: CachePolicy::forever(),
            options_retry: RetryPolicy::new(FILTER_OPTIONS_RETRIES),
        }
    }
}

/// Data fetch client: caches results per [`QueryKey`], shares one in-flight
/// request between concurrent callers of the same key, and retries failed
/// attempts within a fixed budget.
pub struct SalesClient {
    backend: Arc<dyn SalesBackend>,
    policy: ClientPolicy,
    searches: Arc<Mutex<QueryStore<SearchResult>>>,
    options: Arc<Mutex<QueryStore<FilterOptions>>>,
}

impl SalesClient {
    pub fn new(backend: Arc<dyn SalesBackend>) -> Arc<Self> {
        Self::new_with_policy(backend, ClientPolicy::default())
    }

    pub fn new_with_policy(backend: Arc<dyn SalesBackend>, policy: ClientPolicy) -> Arc<Self> {
        Arc::new(Self {
            backend,
            policy,
            searches: Arc::new(Mutex::new(QueryStore::new(policy.search_cache))),
            options: Arc::new(Mutex::new(QueryStore::new(policy.options_cache))),
        })
    }

    /// HTTP client for the configured base URL.
    pub fn from_settings(settings: &ClientSettings) -> Arc<Self> {
        info!(
            base_url = %settings.api_base_url,
            "settings: sales api configured"
        );
        Self::new_with_policy(
            Arc::new(HttpSalesBackend::new(settings.api_base_url.clone())),
            settings.client_policy(),
        )
    }

    pub fn policy(&self) -> ClientPolicy {
        self.policy
    }

    /// Filter options are fetched once and kept for the life of the client.
    pub async fn fetch_filter_options(&self) -> FetchResult<Arc<FilterOptions>> {
        let backend = Arc::clone(&self.backend);
        fetch_through(
            &self.options,
            QueryKey::unit(FILTER_OPTIONS_KEY),
            self.policy.options_retry,
            "filter_options",
            move || {
                let backend = Arc::clone(&backend);
                async move { backend.filter_options().await }
            },
        )
        .await
    }

    pub async fn search_transactions(
        &self,
        query: &NormalizedQuery,
    ) -> FetchResult<Arc<SearchResult>> {
        let backend = Arc::clone(&self.backend);
        let body = query.clone();
        fetch_through(
            &self.searches,
            query.key(),
            self.policy.search_retry,
            "search",
            move || {
                let backend = Arc::clone(&backend);
                let body = body.clone();
                async move { backend.search(&body).await }
            },
        )
        .await
    }

    /// Cached search state for `query` without touching the network.
    pub async fn cached_search(&self, query: &NormalizedQuery) -> CacheLookup<SearchResult> {
        let now = Instant::now();
        let mut guard = self.searches.lock().await;
        guard.evict_idle(now);
        guard.peek(&query.key(), now)
    }

    pub async fn cached_search_count(&self) -> usize {
        self.searches.lock().await.len()
    }

    /// Drops every cached search page. In-flight requests are unaffected.
    pub async fn invalidate_searches(&self) {
        let mut guard = self.searches.lock().await;
        let dropped = guard.len();
        guard.clear();
        info!(dropped, "cache: search results invalidated");
    }
}

/// Serves `key` from `store` when fresh, joins a matching in-flight fetch,
/// or starts a new one.
///
/// New fetches run as their own task. The task records its result in the
/// store even if every caller has gone away, so a superseded request still
/// fills its own entry.
async fn fetch_through<V, F, Fut>(
    store: &Arc<Mutex<QueryStore<V>>>,
    key: QueryKey,
    retry: RetryPolicy,
    label: &'static str,
    operation: F,
) -> FetchResult<Arc<V>>
where
    V: Send + Sync + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = FetchResult<V>> + Send + 'static,
{
    let pending = {
        let now = Instant::now();
        let mut guard = store.lock().await;
        let evicted = guard.evict_idle(now);
        if evicted > 0 {
            debug!(request = label, evicted, "cache: swept idle entries");
        }

        match guard.lookup(&key, now) {
            CacheLookup::Fresh(value) => {
                debug!(request = label, key = %key, "cache: fresh hit");
                return Ok(value);
            }
            CacheLookup::Stale(_) => {
                debug!(request = label, key = %key, "cache: stale entry; refetching");
            }
            CacheLookup::Missing => {}
        }

        if let Some(shared) = guard.inflight.get(&key) {
            debug!(request = label, key = %key, "cache: joining in-flight request");
            shared.clone()
        } else {
            let task_store = Arc::clone(store);
            let task_key = key.clone();
            let handle = tokio::spawn(async move {
                let outcome = with_retry(retry, label, operation).await.map(Arc::new);
                let mut guard = task_store.lock().await;
                guard.inflight.remove(&task_key);
                if let Ok(value) = &outcome {
                    guard.insert(task_key, Arc::clone(value), Instant::now());
                }
                outcome
            });
            let shared = async move {
                handle.await.unwrap_or_else(|err| {
                    Err(FetchError::Network(format!("{label} task failed: {err}")))
                })
            }
            .boxed()
            .shared();
            guard.inflight.insert(key, shared.clone());
            shared
        }
    };

    pending.await
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
