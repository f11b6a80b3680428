//! HTTP tests for `/posts`, `/health` and the schema validation layer.
//!
//! Each test spawns the real router on an ephemeral port, backed by the
//! in-memory store and a mock upstream fetcher, and drives it with reqwest.

use std::sync::Arc;
use std::time::Duration;

use linkfeed_api::{build_router, AppState};
use linkfeed_core::{FetchedLink, ParameterSchema, PostRepository, TIMESTAMP_FORMAT};
use linkfeed_db::MemoryPostRepository;
use linkfeed_fetch::MockLinkFetcher;
use linkfeed_jobs::{SchedulerConfig, SchedulerHandle, UpdateScheduler};
use serde_json::Value;

const FAKE_RECORDS: [(&str, &str); 5] = [
    ("http://server1", "Title 1"),
    ("http://server2", "Title 2"),
    ("http://server3", "Title 3"),
    ("http://server4", "Title 4"),
    ("http://server5", "A Title 5"),
];

fn fake_links() -> Vec<FetchedLink> {
    FAKE_RECORDS
        .iter()
        .map(|(url, title)| FetchedLink::new(*url, *title))
        .collect()
}

fn load_schema() -> ParameterSchema {
    ParameterSchema::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../../api.yaml"))
        .expect("api.yaml should load")
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    fetcher: MockLinkFetcher,
    scheduler: Option<SchedulerHandle>,
}

impl TestServer {
    /// Server whose store is empty until a `force_update` fetches the fake
    /// records.
    async fn empty() -> Self {
        Self::spawn(MemoryPostRepository::new()).await
    }

    /// Server with the five fake records already stored (ids 1..=5).
    async fn seeded() -> Self {
        let repo = MemoryPostRepository::new();
        repo.insert_ignoring_duplicates(&fake_links()).await.unwrap();
        Self::spawn(repo).await
    }

    async fn spawn(repo: MemoryPostRepository) -> Self {
        let fetcher = MockLinkFetcher::new(fake_links());
        let posts: Arc<dyn PostRepository> = Arc::new(repo);
        let scheduler = UpdateScheduler::new(
            Arc::new(fetcher.clone()),
            posts.clone(),
            SchedulerConfig::default()
                .with_throttle_interval(Duration::from_secs(60))
                .with_beat_enabled(false),
        )
        .start();

        let state = AppState {
            schema: Arc::new(load_schema()),
            posts,
            refresh: scheduler.trigger(),
            page_limit: 5,
        };
        let router = build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            fetcher,
            scheduler: Some(scheduler),
        }
    }

    async fn get(&self, path_and_query: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path_and_query))
            .send()
            .await
            .unwrap()
    }

    async fn get_json(&self, path_and_query: &str) -> (u16, Value) {
        let response = self.get(path_and_query).await;
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn stop_scheduler(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await.unwrap();
        }
    }
}

async fn assert_error(server: &TestServer, path_and_query: &str, status: u16, message: &str) {
    let (actual, body) = server.get_json(path_and_query).await;
    assert_eq!(actual, status, "{path_and_query}");
    assert_eq!(body["error"], message, "{path_and_query}");
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_i64().unwrap())
        .collect()
}

// =============================================================================
// Routing and validation
// =============================================================================

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = TestServer::seeded().await;
    assert_error(&server, "/nope", 404, "Not found").await;
    assert_error(&server, "/posts/1", 404, "Not found").await;
}

#[tokio::test]
async fn test_unregistered_method_is_not_found() {
    let server = TestServer::seeded().await;
    let response = server
        .client
        .post(format!("{}/posts", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_wrong_parameters() {
    let server = TestServer::seeded().await;
    assert_error(&server, "/posts?fdsa=afs", 400, "Parameter fdsa is not recognized").await;
    assert_error(&server, "/posts?offset=-1", 400, "Parameter offset is outside of permitted range").await;
    assert_error(&server, "/posts?limit=-1", 400, "Parameter limit is outside of permitted range").await;
    assert_error(&server, "/posts?limit=0", 400, "Parameter limit is outside of permitted range").await;
    assert_error(&server, "/posts?limit=ten", 400, "Parameter limit is not a valid integer").await;
    assert_error(&server, "/posts?limit=1.5", 400, "Parameter limit is not a valid integer").await;
    assert_error(&server, "/posts?order=fubar", 400, "Parameter order doesn't match pattern").await;
    assert_error(&server, "/posts?order=created%20at", 400, "Parameter order doesn't match pattern").await;
    assert_error(&server, "/posts?descending=snafu", 400, "Parameter descending should be true or false").await;
    assert_error(&server, "/posts?force_update=1", 400, "Parameter force_update should be true or false").await;
}

#[tokio::test]
async fn test_first_failing_parameter_wins() {
    let server = TestServer::seeded().await;
    assert_error(
        &server,
        "/posts?limit=2&fdsa=afs&offset=-1",
        400,
        "Parameter fdsa is not recognized",
    )
    .await;
}

#[tokio::test]
async fn test_health_rejects_parameters() {
    let server = TestServer::seeded().await;
    assert_error(&server, "/health?verbose=true", 400, "Parameter verbose is not recognized").await;
}

#[tokio::test]
async fn test_minimum_is_inclusive() {
    let server = TestServer::seeded().await;
    assert_eq!(server.get("/posts?offset=0").await.status().as_u16(), 200);
    assert_eq!(server.get("/posts?limit=1").await.status().as_u16(), 200);
}

#[tokio::test]
async fn test_boolean_literals_are_exact() {
    let server = TestServer::seeded().await;
    assert_eq!(server.get("/posts?descending=true").await.status().as_u16(), 200);
    assert_eq!(server.get("/posts?descending=false").await.status().as_u16(), 200);
    assert_eq!(server.get("/posts?descending=TRUE").await.status().as_u16(), 400);
    assert_eq!(server.get("/posts?descending=").await.status().as_u16(), 400);
}

// =============================================================================
// Response format and read path
// =============================================================================

#[tokio::test]
async fn test_response_format() {
    let server = TestServer::empty().await;

    let response = server.get("/posts?force_update=true").await;
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let text = response.text().await.unwrap();

    // Field order is part of the contract.
    let first = &text[..text.find('}').unwrap()];
    let positions: Vec<usize> = ["\"id\"", "\"url\"", "\"title\"", "\"created_at\""]
        .iter()
        .map(|key| first.find(key).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{first}");

    let data: Value = serde_json::from_str(&text).unwrap();
    let entries = data.as_array().unwrap();
    assert_eq!(entries.len(), 5);
    for entry in entries {
        assert_eq!(entry.as_object().unwrap().len(), 4);
        assert!(entry["id"].is_i64());
        assert!(entry["url"].as_str().unwrap().starts_with("http://"));
        assert!(entry["title"].as_str().unwrap().contains(' '));
        let created_at = entry["created_at"].as_str().unwrap();
        chrono::DateTime::parse_from_str(created_at, TIMESTAMP_FORMAT)
            .unwrap_or_else(|e| panic!("bad created_at {created_at}: {e}"));
    }
}

#[tokio::test]
async fn test_empty_store_returns_empty_array() {
    let server = TestServer::empty().await;
    let (status, body) = server.get_json("/posts").await;
    assert_eq!(status, 200);
    assert_eq!(body, Value::Array(Vec::new()));
    assert_eq!(server.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_default_page() {
    let server = TestServer::seeded().await;
    let (_, body) = server.get_json("/posts").await;
    assert_eq!(ids(&body), [1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_limit() {
    let server = TestServer::seeded().await;
    for limit in 1..=5 {
        let (status, body) = server.get_json(&format!("/posts?limit={limit}")).await;
        assert_eq!(status, 200);
        assert_eq!(body.as_array().unwrap().len(), limit);
    }
}

#[tokio::test]
async fn test_offset() {
    let server = TestServer::seeded().await;
    for offset in 1..=5 {
        let (status, body) = server.get_json(&format!("/posts?offset={offset}")).await;
        assert_eq!(status, 200);
        assert_eq!(body.as_array().unwrap().len(), 5 - offset);
    }
}

#[tokio::test]
async fn test_pagination_applies_after_ordering() {
    let server = TestServer::seeded().await;

    let (_, body) = server.get_json("/posts?limit=2&offset=1&order=id").await;
    assert_eq!(ids(&body), [2, 3]);

    let (_, body) = server.get_json("/posts?order=id&descending=true&limit=1").await;
    assert_eq!(ids(&body), [5]);
}

#[tokio::test]
async fn test_order() {
    let server = TestServer::seeded().await;
    for order in ["id", "url", "title", "created_at"] {
        let (status, data) = server.get_json(&format!("/posts?order={order}&limit=2")).await;
        assert_eq!(status, 200);
        assert!(
            data[0][order].to_string() <= data[1][order].to_string(),
            "{order}: {data}"
        );
    }

    let (_, data) = server.get_json("/posts?order=title&limit=1").await;
    assert_eq!(data[0]["title"], "A Title 5");
}

#[tokio::test]
async fn test_order_descending() {
    let server = TestServer::seeded().await;
    for order in ["id", "url", "title", "created_at"] {
        let (status, data) = server
            .get_json(&format!("/posts?order={order}&limit=2&descending=true"))
            .await;
        assert_eq!(status, 200);
        assert!(
            data[0][order].to_string() >= data[1][order].to_string(),
            "{order}: {data}"
        );
    }
}

#[tokio::test]
async fn test_repeated_parameter_first_wins() {
    let server = TestServer::seeded().await;
    let (_, body) = server.get_json("/posts?limit=2&limit=4").await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

// =============================================================================
// Forced refresh
// =============================================================================

#[tokio::test]
async fn test_force_update_fetches_once_within_throttle() {
    let server = TestServer::empty().await;

    for _ in 0..3 {
        let (status, body) = server.get_json("/posts?force_update=true").await;
        assert_eq!(status, 200);
        assert_eq!(body.as_array().unwrap().len(), 5);
    }
    assert_eq!(server.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_concurrent_force_updates_coalesce() {
    let server = Arc::new(TestServer::empty().await);

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let server = server.clone();
            tokio::spawn(async move { server.get_json("/posts?force_update=true&limit=5").await })
        })
        .collect();

    for request in requests {
        let (status, body) = request.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body.as_array().unwrap().len(), 5);
    }
    assert_eq!(server.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_force_update_with_failing_upstream_serves_stored_posts() {
    let server = TestServer::seeded().await;
    server.fetcher.fail_next(1);

    let (status, body) = server.get_json("/posts?force_update=true").await;
    assert_eq!(status, 200);
    assert_eq!(ids(&body), [1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_force_update_after_scheduler_stopped_is_unavailable() {
    let mut server = TestServer::seeded().await;
    server.stop_scheduler().await;

    let (status, body) = server.get_json("/posts?force_update=true").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "Update scheduler is not running");

    // Plain reads keep working.
    let (status, _) = server.get_json("/posts").await;
    assert_eq!(status, 200);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let server = TestServer::empty().await;
    server.get("/posts?force_update=true").await;

    let (status, body) = server.get_json("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["posts"], 5);
    assert_eq!(body["scheduler"]["cycles_completed"], 1);
    assert_eq!(
        body["scheduler"]["last_outcome"],
        "fetched 5 links, inserted 5"
    );
    assert!(body["scheduler"]["last_fetch_at"].is_string());
}

#[tokio::test]
async fn test_health_degraded_after_scheduler_stopped() {
    let mut server = TestServer::seeded().await;
    server.stop_scheduler().await;

    let (status, body) = server.get_json("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "degraded");
}
