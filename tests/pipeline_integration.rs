//! Integration tests for a full pipeline run over HTTP.
//!
//! A mock server plays both the source API (listing and detail endpoints) and
//! the destination (`/home`).

use std::sync::Arc;
use std::time::Duration;

use animal_etl::client::{AnimalApi, ApiClient, ClientSettings, RetryPolicy};
use animal_etl::pipeline::{FetchMode, Pipeline, PipelineConfig, PipelineStage, StageError};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[macro_use]
mod support;

// ==================== Mock Responders ====================

/// Serves ids `1..=total` in pages of `page_size`, reading `?page=N`.
struct ListingPages {
    total: i64,
    page_size: i64,
}

impl Respond for ListingPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let page: i64 = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(1);
        let total_pages = (self.total + self.page_size - 1) / self.page_size;
        let first = (page - 1) * self.page_size + 1;
        let last = (page * self.page_size).min(self.total);
        let items: Vec<Value> = (first..=last).map(|id| json!({"id": id})).collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "page": page,
            "total_pages": total_pages,
            "items": items
        }))
    }
}

/// Returns a raw animal whose id is taken from the request path.
struct EchoAnimal;

impl Respond for EchoAnimal {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id: i64 = request
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|segment| segment.parse().ok())
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "name": format!("animal-{id}"),
            "friends": "Ann, Bo ,",
            "born_at": 1_609_459_200_000_i64
        }))
    }
}

// ==================== Helper Functions ====================

fn fast_api(mock_server: &MockServer) -> Arc<dyn AnimalApi> {
    let settings = ClientSettings {
        request_timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5), 2.0),
        ..ClientSettings::default()
    };
    Arc::new(ApiClient::with_settings(&mock_server.uri(), settings).unwrap())
}

async fn mount_source(mock_server: &MockServer, total: i64, page_size: i64) {
    Mock::given(method("GET"))
        .and(path("/animals/v1/animals"))
        .respond_with(ListingPages { total, page_size })
        .mount(mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/animals/v1/animals/\d+$"))
        .respond_with(EchoAnimal)
        .mount(mock_server)
        .await;
}

async fn posted_batches(mock_server: &MockServer) -> Vec<Vec<Value>> {
    mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/animals/v1/home")
        .map(|request| serde_json::from_slice::<Vec<Value>>(&request.body).unwrap())
        .collect()
}

// ==================== Pipeline Tests ====================

#[tokio::test]
async fn test_pipeline_moves_every_animal_and_normalizes_fields() {
    let mock_server = require_mock_server!();
    mount_source(&mock_server, 7, 3).await;
    Mock::given(method("POST"))
        .and(path("/animals/v1/home"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = PipelineConfig {
        fetch_mode: FetchMode::Parallel { concurrency: 4 },
        batch_size: 5,
    };
    let mut pipeline = Pipeline::new(fast_api(&mock_server), config).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(pipeline.stage(), PipelineStage::Done);
    assert_eq!(summary.discovered, 7);
    assert_eq!(summary.loaded, 7);

    let batches = posted_batches(&mock_server).await;
    let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![5, 2]);

    let mut ids: Vec<i64> = batches
        .iter()
        .flatten()
        .filter_map(|animal| animal["id"].as_i64())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=7).collect::<Vec<_>>());

    for animal in batches.iter().flatten() {
        assert_eq!(animal["friends"], json!(["Ann", "Bo"]));
        let born_at = animal["born_at"].as_str().unwrap();
        assert!(born_at.contains("2021-01-01"), "Expected ISO date in: {born_at}");
    }
}

#[tokio::test]
async fn test_sequential_pipeline_uploads_in_listing_order() {
    let mock_server = require_mock_server!();
    mount_source(&mock_server, 5, 2).await;
    Mock::given(method("POST"))
        .and(path("/animals/v1/home"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let config = PipelineConfig {
        fetch_mode: FetchMode::Sequential,
        batch_size: 100,
    };
    let mut pipeline = Pipeline::new(fast_api(&mock_server), config).unwrap();
    pipeline.run().await.unwrap();

    let batches = posted_batches(&mock_server).await;
    assert_eq!(batches.len(), 1);
    let ids: Vec<i64> = batches[0].iter().filter_map(|a| a["id"].as_i64()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_second_batch_failure_reports_first_batch_loaded() {
    let mock_server = require_mock_server!();
    mount_source(&mock_server, 250, 100).await;
    Mock::given(method("POST"))
        .and(path("/animals/v1/home"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/animals/v1/home"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = PipelineConfig {
        fetch_mode: FetchMode::Parallel { concurrency: 10 },
        batch_size: 100,
    };
    let mut pipeline = Pipeline::new(fast_api(&mock_server), config).unwrap();
    let error = pipeline.run().await.unwrap_err();

    assert_eq!(error.stage(), PipelineStage::Loading);
    assert_eq!(error.loaded(), 100);
    assert_eq!(pipeline.stage(), PipelineStage::Failed);
    assert!(matches!(error.stage_error(), StageError::Load(_)));
}

#[tokio::test]
async fn test_detail_failure_stops_before_loading() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/animals/v1/animals/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    mount_source(&mock_server, 3, 10).await;
    Mock::given(method("POST"))
        .and(path("/animals/v1/home"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut pipeline = Pipeline::new(fast_api(&mock_server), PipelineConfig::default()).unwrap();
    let error = pipeline.run().await.unwrap_err();

    assert_eq!(error.stage(), PipelineStage::Fetching);
    assert_eq!(error.loaded(), 0);
    assert!(
        error.to_string().contains("animal 2"),
        "Expected failing id in: {error}"
    );
}

#[tokio::test]
async fn test_empty_source_loads_nothing() {
    let mock_server = require_mock_server!();
    mount_source(&mock_server, 0, 10).await;
    Mock::given(method("POST"))
        .and(path("/animals/v1/home"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut pipeline = Pipeline::new(fast_api(&mock_server), PipelineConfig::default()).unwrap();
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.discovered, 0);
    assert_eq!(summary.loaded, 0);
}
