use super::*;
use crate::test_support::{sample_options, FakeBackend};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{SortBy, SortOrder};
use std::time::Duration;
use tokio::net::TcpListener;

fn client_with(backend: &Arc<FakeBackend>) -> Arc<SalesClient> {
    SalesClient::new(Arc::clone(backend) as Arc<dyn SalesBackend>)
}

fn query_for_page(page: u32) -> NormalizedQuery {
    let mut state = QueryState::default();
    state.set_page(page);
    NormalizedQuery::from_state(&state)
}

#[tokio::test(start_paused = true)]
async fn identical_search_within_freshness_window_is_served_from_cache() {
    let backend = Arc::new(FakeBackend::default());
    let client = client_with(&backend);
    let query = query_for_page(1);

    let first = client.search_transactions(&query).await.expect("first");
    tokio::time::advance(Duration::from_secs(29)).await;
    let second = client.search_transactions(&query).await.expect("second");

    assert_eq!(backend.search_count(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test(start_paused = true)]
async fn stale_entry_is_refetched() {
    let backend = Arc::new(FakeBackend::default());
    let client = client_with(&backend);
    let query = query_for_page(1);

    client.search_transactions(&query).await.expect("first");
    tokio::time::advance(Duration::from_secs(31)).await;

    assert!(matches!(
        client.cached_search(&query).await,
        CacheLookup::Stale(_)
    ));
    client.search_transactions(&query).await.expect("refetch");
    assert_eq!(backend.search_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn entry_unused_for_five_minutes_is_evicted() {
    let backend = Arc::new(FakeBackend::default());
    let client = client_with(&backend);
    let query = query_for_page(2);

    client.search_transactions(&query).await.expect("first");
    assert_eq!(client.cached_search_count().await, 1);

    tokio::time::advance(Duration::from_secs(5 * 60)).await;

    assert!(matches!(
        client.cached_search(&query).await,
        CacheLookup::Missing
    ));
    assert_eq!(client.cached_search_count().await, 0);
    client.search_transactions(&query).await.expect("after eviction");
    assert_eq!(backend.search_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn inspecting_cache_does_not_extend_entry_lifetime() {
    let backend = Arc::new(FakeBackend::default());
    let client = client_with(&backend);
    let query = query_for_page(2);

    client.search_transactions(&query).await.expect("first");

    tokio::time::advance(Duration::from_secs(200)).await;
    assert!(matches!(
        client.cached_search(&query).await,
        CacheLookup::Stale(_)
    ));

    tokio::time::advance(Duration::from_secs(100)).await;
    assert!(matches!(
        client.cached_search(&query).await,
        CacheLookup::Missing
    ));
    assert_eq!(client.cached_search_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_searches_share_one_request() {
    let backend = Arc::new(FakeBackend::with_latency(Duration::from_millis(200)));
    let client = client_with(&backend);
    let query = query_for_page(1);

    let (first, second) = tokio::join!(
        client.search_transactions(&query),
        client.search_transactions(&query)
    );

    assert_eq!(backend.search_count(), 1);
    assert!(Arc::ptr_eq(&first.expect("first"), &second.expect("second")));
}

#[tokio::test(start_paused = true)]
async fn distinct_queries_are_cached_separately() {
    let backend = Arc::new(FakeBackend::default());
    let client = client_with(&backend);

    let one = client.search_transactions(&query_for_page(1)).await.expect("page 1");
    let three = client.search_transactions(&query_for_page(3)).await.expect("page 3");
    client.search_transactions(&query_for_page(1)).await.expect("page 1 again");

    assert_eq!(one.page, 1);
    assert_eq!(three.page, 3);
    assert_eq!(backend.search_count(), 2);
    assert_eq!(client.cached_search_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn three_network_failures_exhaust_the_retry_budget() {
    let backend = Arc::new(FakeBackend::default());
    backend.fail_searches((0..3).map(|n| FetchError::Network(format!("reset {n}"))));
    let client = client_with(&backend);
    let query = query_for_page(1);

    let err = client
        .search_transactions(&query)
        .await
        .expect_err("must fail");

    assert_eq!(err, FetchError::Network("reset 2".into()));
    assert_eq!(backend.search_count(), 3);
    assert_eq!(client.cached_search_count().await, 0);

    // Failures are not cached; the next call goes back to the network.
    client.search_transactions(&query).await.expect("recovered");
    assert_eq!(backend.search_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_is_hidden_by_retry() {
    let backend = Arc::new(FakeBackend::default());
    backend.fail_searches([FetchError::Server {
        status: 502,
        message: "bad gateway".into(),
    }]);
    let client = client_with(&backend);

    let result = client
        .search_transactions(&query_for_page(1))
        .await
        .expect("second attempt succeeds");

    assert_eq!(result.page, 1);
    assert_eq!(backend.search_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn abandoned_request_still_fills_its_cache_entry() {
    let backend = Arc::new(FakeBackend::with_latency(Duration::from_millis(500)));
    let client = client_with(&backend);
    let query = query_for_page(4);

    let caller = {
        let client = Arc::clone(&client);
        let query = query.clone();
        tokio::spawn(async move { client.search_transactions(&query).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    caller.abort();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(matches!(
        client.cached_search(&query).await,
        CacheLookup::Fresh(result) if result.page == 4
    ));
    assert_eq!(backend.search_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalidation_forces_a_new_request() {
    let backend = Arc::new(FakeBackend::default());
    let client = client_with(&backend);
    let query = query_for_page(1);

    client.search_transactions(&query).await.expect("first");
    client.invalidate_searches().await;
    client.search_transactions(&query).await.expect("second");

    assert_eq!(backend.search_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn filter_options_are_fetched_once_for_the_process() {
    let backend = Arc::new(FakeBackend::with_latency(Duration::from_millis(50)));
    let client = client_with(&backend);

    let (first, second) = tokio::join!(client.fetch_filter_options(), client.fetch_filter_options());
    tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
    let later = client.fetch_filter_options().await.expect("later");

    assert_eq!(backend.options_count(), 1);
    assert_eq!(*first.expect("first"), sample_options());
    assert!(Arc::ptr_eq(&second.expect("second"), &later));
}

#[tokio::test(start_paused = true)]
async fn filter_options_retry_three_times() {
    let backend = Arc::new(FakeBackend::default());
    backend.fail_options((0..4).map(|_| FetchError::Decode("truncated".into())));
    let client = client_with(&backend);

    let err = client.fetch_filter_options().await.expect_err("must fail");

    assert_eq!(err.kind(), "decode");
    assert_eq!(backend.options_count(), 4);
}

#[derive(Clone, Default)]
struct RecordingServer {
    bodies: Arc<std::sync::Mutex<Vec<Value>>>,
}

async fn handle_search(State(state): State<RecordingServer>, Json(body): Json<Value>) -> Json<Value> {
    let page = body.get("page").cloned().unwrap_or(json!(1));
    state.bodies.lock().expect("bodies lock").push(body);
    Json(json!({
        "data": [],
        "total_count": 0,
        "page": page,
        "page_size": 10,
        "total_pages": 0,
        "has_next": false,
        "has_previous": false
    }))
}

async fn handle_options() -> Json<FilterOptions> {
    Json(sample_options())
}

async fn spawn_sales_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_backend_posts_only_present_fields() {
    let state = RecordingServer::default();
    let app = Router::new()
        .route(SEARCH_PATH, post(handle_search))
        .route(FILTER_OPTIONS_PATH, get(handle_options))
        .with_state(state.clone());
    let base_url = spawn_sales_server(app).await;
    let backend = HttpSalesBackend::new(format!("{base_url}/"));

    let mut query = QueryState::default();
    query.set_customer_regions(Vec::<String>::new());
    query.set_age_range(Some(0), None);
    query.set_genders(["Male", "Female"]);
    query.set_sorting(SortBy::CustomerName, SortOrder::Asc);
    query.set_page(2);

    let result = backend
        .search(&NormalizedQuery::from_state(&query))
        .await
        .expect("search");
    let options = backend.filter_options().await.expect("options");

    assert_eq!(result.page, 2);
    assert_eq!(options, sample_options());
    let bodies = state.bodies.lock().expect("bodies lock").clone();
    assert_eq!(
        bodies,
        vec![json!({
            "age_min": 0,
            "genders": ["Female", "Male"],
            "sort_by": "customer_name",
            "sort_order": "asc",
            "page": 2,
            "page_size": 10
        })]
    );
}

#[tokio::test]
async fn http_backend_maps_non_success_status_to_server_error() {
    let app = Router::new().route(
        SEARCH_PATH,
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "Error searching sales: db down"})),
            )
        }),
    );
    let backend = HttpSalesBackend::new(spawn_sales_server(app).await);

    let err = backend
        .search(&query_for_page(1))
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        FetchError::Server {
            status: 500,
            message: "Error searching sales: db down".into()
        }
    );
}

#[tokio::test]
async fn http_backend_reports_plain_text_error_bodies() {
    let app = Router::new().route(
        FILTER_OPTIONS_PATH,
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let backend = HttpSalesBackend::new(spawn_sales_server(app).await);

    let err = backend.filter_options().await.expect_err("must fail");

    assert_eq!(
        err,
        FetchError::Server {
            status: 503,
            message: "maintenance".into()
        }
    );
}

#[tokio::test]
async fn http_backend_maps_malformed_body_to_decode_error() {
    let app = Router::new().route(
        SEARCH_PATH,
        post(|| async { Json(json!({"data": "not a list"})) }),
    );
    let backend = HttpSalesBackend::new(spawn_sales_server(app).await);

    let err = backend
        .search(&query_for_page(1))
        .await
        .expect_err("must fail");

    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn http_backend_maps_refused_connection_to_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let backend = HttpSalesBackend::new(format!("http://{addr}"));

    let err = backend.filter_options().await.expect_err("must fail");

    assert!(matches!(err, FetchError::Network(_)), "unexpected error: {err:?}");
}

#[tokio::test]
async fn client_over_http_caches_repeated_searches() {
    let state = RecordingServer::default();
    let app = Router::new()
        .route(SEARCH_PATH, post(handle_search))
        .with_state(state.clone());
    let base_url = spawn_sales_server(app).await;
    let settings = ClientSettings {
        api_base_url: base_url,
        ..ClientSettings::default()
    };
    let client = SalesClient::from_settings(&settings);
    let query = query_for_page(1);

    client.search_transactions(&query).await.expect("first");
    client.search_transactions(&query).await.expect("second");

    assert_eq!(state.bodies.lock().expect("bodies lock").len(), 1);
}
