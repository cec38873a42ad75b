//! Integration tests for the record-replay cycle

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;

use retake::config::{Config, QuiesceConfig};
use retake::storage::FixtureFile;
use retake::transport::ResponseCollector;
use retake::{
    DispatchHandler, DispatchRequest, MockEngine, RequestOptions, Result, RetakeError, Transport,
};

/// One scripted upstream response
struct UpstreamReply {
    status: u16,
    chunks: Vec<&'static str>,
    trailers: Vec<(&'static str, &'static str)>,
}

/// Controlled upstream double: scripted replies, no sockets
///
/// Replies are keyed by `"{method} {path}"` and consumed in order; an
/// unscripted request fails like a dead upstream would.
#[derive(Default)]
struct ScriptedUpstream {
    replies: Mutex<HashMap<String, VecDeque<UpstreamReply>>>,
    hits: AtomicUsize,
}

impl ScriptedUpstream {
    fn new() -> Self {
        Self::default()
    }

    fn reply(self, method: &str, path: &str, status: u16, chunks: Vec<&'static str>) -> Self {
        self.reply_with_trailers(method, path, status, chunks, vec![])
    }

    fn reply_with_trailers(
        self,
        method: &str,
        path: &str,
        status: u16,
        chunks: Vec<&'static str>,
        trailers: Vec<(&'static str, &'static str)>,
    ) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(UpstreamReply {
                status,
                chunks,
                trailers,
            });
        self
    }

    fn hit_count(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for ScriptedUpstream {
    async fn dispatch(
        &self,
        request: DispatchRequest,
        handler: &mut dyn DispatchHandler,
    ) -> Result<()> {
        self.hits.fetch_add(1, Ordering::Relaxed);
        handler.on_request_start();

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&format!("{} {}", request.method, request.path))
            .and_then(VecDeque::pop_front);

        let Some(reply) = reply else {
            let error = RetakeError::Transport(format!(
                "no scripted reply for {} {}",
                request.method, request.path
            ));
            handler.on_response_error(&error);
            return Err(error);
        };

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        handler.on_response_start(reply.status, headers);

        for chunk in reply.chunks {
            handler.on_response_data(Bytes::from_static(chunk.as_bytes()));
        }

        let trailers = reply
            .trailers
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        handler.on_response_end(trailers);
        Ok(())
    }
}

fn test_engine(temp_dir: &TempDir, upstream: Arc<ScriptedUpstream>) -> MockEngine {
    let config = Config {
        fixtures_dir: temp_dir.path().join("mocks"),
        quiesce: QuiesceConfig {
            poll_interval_ms: 5,
            max_polls: 2,
        },
    };
    MockEngine::new(config, upstream)
}

/// Issue one request through the engine's active transport
async fn issue(
    engine: &MockEngine,
    method: &str,
    origin: &str,
    path: &str,
    body: Option<&str>,
) -> Result<ResponseCollector> {
    let headers: Vec<(String, String)> = body
        .map(|b| vec![("content-length".to_string(), b.len().to_string())])
        .unwrap_or_default();

    let options = RequestOptions {
        method: method.to_string(),
        headers: headers.clone(),
        body: body.map(str::to_string),
    };

    let transport = engine.transport(&format!("{origin}{path}"), &options)?;

    let request = DispatchRequest {
        origin: origin.to_string(),
        method: method.to_string(),
        path: path.to_string(),
        headers,
        body: body.map(|b| Bytes::copy_from_slice(b.as_bytes())),
    };

    let mut collector = ResponseCollector::new();
    transport.dispatch(request, &mut collector).await?;
    Ok(collector)
}

fn read_fixture(temp_dir: &TempDir, session_id: &str) -> FixtureFile {
    let path = temp_dir.path().join(format!("mocks/{session_id}.json"));
    let contents = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&contents).unwrap()
}

#[tokio::test]
async fn test_record_then_replay_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let upstream = Arc::new(ScriptedUpstream::new().reply_with_trailers(
        "GET",
        "/x",
        201,
        vec!["o", "k"],
        vec![("x-checksum", "abc")],
    ));
    let mut engine = test_engine(&temp_dir, Arc::clone(&upstream));

    // Phase 1: record session "s1" against the controlled upstream.
    {
        engine.enable("s1", true).await.unwrap();

        let response = issue(&engine, "GET", "http://stub", "/x", None).await.unwrap();
        assert_eq!(response.status, Some(201));
        assert_eq!(response.body_text(), "ok");

        engine.disable().await.unwrap();
        assert_eq!(upstream.hit_count(), 1);
    }

    // Phase 2: replay the persisted fixture without touching the upstream.
    {
        engine.enable("s1", false).await.unwrap();

        let response = issue(&engine, "GET", "http://stub", "/x", None).await.unwrap();
        assert_eq!(response.status, Some(201));
        assert_eq!(response.body_text(), "ok");
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("text/plain")
        );
        assert_eq!(
            response.trailers.get("x-checksum").map(String::as_str),
            Some("abc")
        );

        // An unrecorded request fails without reaching the upstream.
        let denied = issue(&engine, "GET", "http://stub", "/y", None).await;
        assert!(matches!(denied, Err(RetakeError::UnmatchedRequest { .. })));
        assert_eq!(upstream.hit_count(), 1);
    }
}

#[tokio::test]
async fn test_concrete_fixture_contents() {
    let temp_dir = TempDir::new().unwrap();
    let upstream = Arc::new(ScriptedUpstream::new().reply("GET", "/x", 201, vec!["ok"]));
    let mut engine = test_engine(&temp_dir, upstream);

    engine.enable("s1", true).await.unwrap();
    issue(&engine, "GET", "http://stub", "/x", None).await.unwrap();
    engine.disable().await.unwrap();

    let fixture = read_fixture(&temp_dir, "s1");
    let records = &fixture.mocks["http://stub"];
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "GET");
    assert_eq!(records[0].path, "/x");
    assert_eq!(records[0].status_code, Some(201));
    assert_eq!(records[0].response_body, "ok");
    assert!(records[0].request_body.is_none());
    assert!(records[0].error.is_none());
}

#[tokio::test]
async fn test_duplicate_requests_replay_in_recorded_order() {
    let temp_dir = TempDir::new().unwrap();
    let upstream = Arc::new(
        ScriptedUpstream::new()
            .reply("GET", "/page", 200, vec!["page1"])
            .reply("GET", "/page", 200, vec!["page2"])
            .reply("GET", "/page", 200, vec!["page3"]),
    );
    let mut engine = test_engine(&temp_dir, upstream);

    engine.enable("pagination", true).await.unwrap();
    for _ in 0..3 {
        issue(&engine, "GET", "http://stub", "/page", None).await.unwrap();
    }
    engine.disable().await.unwrap();

    engine.enable("pagination", false).await.unwrap();
    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = issue(&engine, "GET", "http://stub", "/page", None).await.unwrap();
        bodies.push(response.body_text());
    }

    assert_eq!(bodies, vec!["page1", "page2", "page3"]);

    // All three one-shot rules are now consumed.
    let exhausted = issue(&engine, "GET", "http://stub", "/page", None).await;
    assert!(exhausted.is_err());
}

#[tokio::test]
async fn test_request_body_round_trip_matches_on_length() {
    let temp_dir = TempDir::new().unwrap();
    let upstream = Arc::new(ScriptedUpstream::new().reply("POST", "/items", 200, vec!["created"]));
    let mut engine = test_engine(&temp_dir, upstream);

    engine.enable("bodies", true).await.unwrap();
    issue(&engine, "POST", "http://stub", "/items", Some("{\"id\": 41}"))
        .await
        .unwrap();
    engine.disable().await.unwrap();

    let fixture = read_fixture(&temp_dir, "bodies");
    assert_eq!(
        fixture.mocks["http://stub"][0].request_body.as_deref(),
        Some("{\"id\": 41}")
    );

    engine.enable("bodies", false).await.unwrap();

    // Same length, different content: recorded payloads may embed
    // non-deterministic values, so only the length must line up.
    let response = issue(&engine, "POST", "http://stub", "/items", Some("{\"id\": 77}"))
        .await
        .unwrap();
    assert_eq!(response.body_text(), "created");

    engine.disable().await.unwrap();
    engine.enable("bodies", false).await.unwrap();

    // A different length does not match.
    let denied = issue(&engine, "POST", "http://stub", "/items", Some("{\"id\": 7}")).await;
    assert!(matches!(denied, Err(RetakeError::UnmatchedRequest { .. })));
}

#[tokio::test]
async fn test_enable_persists_active_recording_first() {
    let temp_dir = TempDir::new().unwrap();
    let upstream = Arc::new(ScriptedUpstream::new().reply("GET", "/a", 200, vec!["a"]));
    let mut engine = test_engine(&temp_dir, upstream);

    engine.enable("first", true).await.unwrap();
    issue(&engine, "GET", "http://stub", "/a", None).await.unwrap();

    // Starting a new session implicitly flushes the previous one.
    engine.enable("second", true).await.unwrap();

    let fixture = read_fixture(&temp_dir, "first");
    assert_eq!(fixture.mocks["http://stub"][0].response_body, "a");
    assert_eq!(engine.active_id(), Some("second"));
}

#[tokio::test]
async fn test_error_terminated_requests_are_not_persisted() {
    let temp_dir = TempDir::new().unwrap();
    // "/boom" is unscripted: the upstream fails it like a dead connection.
    let upstream = Arc::new(ScriptedUpstream::new().reply("GET", "/ok", 200, vec!["fine"]));
    let mut engine = test_engine(&temp_dir, upstream);

    engine.enable("errors", true).await.unwrap();
    issue(&engine, "GET", "http://stub", "/ok", None).await.unwrap();
    let failed = issue(&engine, "GET", "http://stub", "/boom", None).await;
    assert!(failed.is_err());

    // The failed request never completes, so disable exhausts its poll
    // budget and persists what it has.
    engine.disable().await.unwrap();

    let fixture = read_fixture(&temp_dir, "errors");
    let records = &fixture.mocks["http://stub"];
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "/ok");
}

#[tokio::test]
async fn test_replay_exposes_fixture_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    let upstream = Arc::new(ScriptedUpstream::new().reply("GET", "/x", 200, vec!["ok"]));
    let mut engine = test_engine(&temp_dir, upstream);

    engine.enable("stamped", true).await.unwrap();
    issue(&engine, "GET", "http://stub", "/x", None).await.unwrap();
    engine.disable().await.unwrap();

    assert!(engine.fixture_recorded_at().is_none());

    engine.enable("stamped", false).await.unwrap();
    assert!(engine.fixture_recorded_at().is_some());
}

#[tokio::test]
async fn test_disable_evicts_cached_fixture() {
    let temp_dir = TempDir::new().unwrap();
    let upstream = Arc::new(ScriptedUpstream::new().reply("GET", "/x", 200, vec!["ok"]));
    let mut engine = test_engine(&temp_dir, upstream);

    engine.enable("evicted", true).await.unwrap();
    issue(&engine, "GET", "http://stub", "/x", None).await.unwrap();
    engine.disable().await.unwrap();

    engine.enable("evicted", false).await.unwrap();
    engine.disable().await.unwrap();

    // The cache entry was dropped on disable; with the file gone the next
    // replay has nothing to load.
    std::fs::remove_file(temp_dir.path().join("mocks/evicted.json")).unwrap();
    let result = engine.enable("evicted", false).await;
    assert!(matches!(result, Err(RetakeError::FixtureNotFound(_))));
}
