//! End-to-end runs against a mock Open-Meteo server and a file-backed store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use weatherflow_pipeline::{CancellationToken, Driver, Pipeline, RetryPolicy, RunError, RunState};
use weatherflow_store::{PersistenceResult, SqliteWeatherStore, WeatherSink};
use weatherflow_weather::{FetchError, Location, OpenMeteoClient, WeatherRecord};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Store wrapper counting how often each sink operation is invoked.
struct CountingSink {
    inner: SqliteWeatherStore,
    schema_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl CountingSink {
    fn new(inner: SqliteWeatherStore) -> Self {
        Self {
            inner,
            schema_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.schema_calls.load(Ordering::SeqCst),
            self.insert_calls.load(Ordering::SeqCst),
        )
    }
}

impl WeatherSink for CountingSink {
    fn ensure_schema(&self) -> PersistenceResult<()> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_schema()
    }

    fn insert(&self, record: &WeatherRecord) -> PersistenceResult<i64> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(record)
    }
}

fn london() -> Location {
    Location::new(51.5074, -0.1278)
}

fn london_payload() -> serde_json::Value {
    serde_json::json!({
        "current_weather": {
            "temperature": 15.2,
            "windspeed": 15.2,
            "winddirection": 200,
            "weathercode": 3
        }
    })
}

fn fetcher(server: &MockServer) -> OpenMeteoClient {
    OpenMeteoClient::with_base_url(&server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_london_reading_lands_in_store() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "51.5074"))
        .and(query_param("longitude", "-0.1278"))
        .and(query_param("current_weather", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_payload()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("weather.db");

    let pipeline = Pipeline::new(
        "weather_etl_pipeline",
        london(),
        fetcher(&mock_server),
        SqliteWeatherStore::open(&db_path).unwrap(),
    );
    let outcome = pipeline.run(&CancellationToken::new()).await;

    assert_eq!(outcome.state(), RunState::Succeeded);
    let completed = outcome.result.unwrap();
    let expected = WeatherRecord {
        latitude: 51.5074,
        longitude: -0.1278,
        temperature: 15.2,
        windspeed: 15.2,
        winddirection: 200.0,
        weathercode: 3,
    };
    assert_eq!(completed.record, expected);

    let store = SqliteWeatherStore::open(&db_path).unwrap();
    let rows = store.recent(10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, completed.row_id);
    assert_eq!(rows[0].record, expected);
}

#[tokio::test]
async fn test_outage_fails_before_transform_and_sink() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sink = Arc::new(CountingSink::new(SqliteWeatherStore::in_memory().unwrap()));
    let pipeline = Pipeline::new("weather_etl_pipeline", london(), fetcher(&mock_server), sink.clone());

    let outcome = pipeline.run(&CancellationToken::new()).await;

    assert_eq!(outcome.states, vec![RunState::Idle, RunState::Fetching, RunState::Failed]);
    assert!(matches!(
        outcome.error(),
        Some(RunError::Fetch(FetchError::Status { status: 503 }))
    ));
    assert_eq!(sink.calls(), (0, 0));
}

#[tokio::test]
async fn test_malformed_payload_never_reaches_sink() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current_weather": {"temperature": 15.2, "windspeed": 15.2, "weathercode": 3}
        })))
        .mount(&mock_server)
        .await;

    let sink = Arc::new(CountingSink::new(SqliteWeatherStore::in_memory().unwrap()));
    let pipeline = Pipeline::new("weather_etl_pipeline", london(), fetcher(&mock_server), sink.clone());

    let outcome = pipeline.run(&CancellationToken::new()).await;

    assert!(
        matches!(
            outcome.error(),
            Some(RunError::Schema(e)) if e.field() == "current_weather.winddirection"
        ),
        "expected schema error, got {:?}",
        outcome.error()
    );
    assert_eq!(sink.calls(), (0, 0));
}

#[tokio::test]
async fn test_repeated_runs_append_rows() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_payload()))
        .expect(3)
        .mount(&mock_server)
        .await;

    let sink = Arc::new(CountingSink::new(SqliteWeatherStore::in_memory().unwrap()));
    let pipeline = Pipeline::new("weather_etl_pipeline", london(), fetcher(&mock_server), sink.clone());

    let cancel = CancellationToken::new();
    for _ in 0..3 {
        assert!(pipeline.run(&cancel).await.is_success());
    }

    // Schema is ensured on every run; identical readings are not deduplicated.
    assert_eq!(sink.calls(), (3, 3));
    assert_eq!(sink.inner.count().unwrap(), 3);
}

#[tokio::test]
async fn test_driver_recovers_from_busy_provider() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london_payload()))
        .mount(&mock_server)
        .await;

    let sink = Arc::new(CountingSink::new(SqliteWeatherStore::in_memory().unwrap()));
    let pipeline = Pipeline::new("weather_etl_pipeline", london(), fetcher(&mock_server), sink.clone());
    let driver = Driver::new(pipeline, RetryPolicy::new(2, Duration::ZERO));

    let report = driver.trigger(&CancellationToken::new()).await.unwrap();

    assert!(report.succeeded());
    assert_eq!(report.attempts, 3);
    assert_eq!(sink.calls(), (1, 1));
}

#[tokio::test]
async fn test_timeout_surfaces_as_fetch_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(london_payload())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let sink = Arc::new(CountingSink::new(SqliteWeatherStore::in_memory().unwrap()));
    let fetcher = OpenMeteoClient::with_base_url(&mock_server.uri(), Duration::from_millis(250)).unwrap();
    let pipeline = Pipeline::new("weather_etl_pipeline", london(), fetcher, sink.clone());

    let outcome = pipeline.run(&CancellationToken::new()).await;

    assert!(matches!(outcome.error(), Some(RunError::Fetch(FetchError::Timeout(_)))));
    assert_eq!(sink.calls(), (0, 0));
}

#[tokio::test]
async fn test_cancel_mid_fetch_writes_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(london_payload())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let sink = Arc::new(CountingSink::new(SqliteWeatherStore::in_memory().unwrap()));
    let pipeline = Pipeline::new("weather_etl_pipeline", london(), fetcher(&mock_server), sink.clone());

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let outcome = pipeline.run(&cancel).await;
    canceller.await.unwrap();

    assert_eq!(outcome.states, vec![RunState::Idle, RunState::Fetching, RunState::Failed]);
    assert!(matches!(outcome.error(), Some(RunError::Cancelled)));
    assert_eq!(sink.calls(), (0, 0));
}
