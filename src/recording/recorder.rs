//! Dispatch interceptor that captures request/response exchanges

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::transport::{DispatchHandler, DispatchRequest, Transport};
use crate::{Result, RetakeError};

use super::{BodyCorrelator, PendingRequests};

/// One captured exchange, recording-time form
///
/// Response chunks stay separate until serialization so partial decodes of
/// multi-byte sequences never interleave. Owned by a single in-flight
/// request's handler until committed at normal completion.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    /// Request origin (scheme + host + port)
    pub origin: String,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Request headers
    pub request_headers: Vec<(String, String)>,
    /// Correlated textual request body, if any
    pub request_body: Option<String>,
    /// Raw response chunks in arrival order
    pub response_chunks: Vec<Bytes>,
    /// Response status code
    pub status_code: Option<u16>,
    /// Response headers
    pub response_headers: Option<BTreeMap<String, String>>,
    /// Response trailers
    pub trailers: Option<BTreeMap<String, String>>,
    /// Error message, if the exchange failed
    pub error: Option<String>,
}

impl InteractionRecord {
    fn for_request(request: &DispatchRequest) -> Self {
        Self {
            origin: request.origin.clone(),
            method: request.method.clone(),
            path: request.path.clone(),
            request_headers: request.headers.clone(),
            request_body: None,
            response_chunks: Vec::new(),
            status_code: None,
            response_headers: None,
            trailers: None,
            error: None,
        }
    }
}

/// Per-origin accumulation of committed records for one recording session
#[derive(Debug, Default)]
pub struct RecordStore {
    origins: DashMap<String, Vec<InteractionRecord>>,
}

impl RecordStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed record to its origin's list, creating it lazily
    pub fn commit(&self, record: InteractionRecord) {
        debug!(
            "recorded {} {}{} -> {:?}",
            record.method, record.origin, record.path, record.status_code
        );
        self.origins
            .entry(record.origin.clone())
            .or_default()
            .push(record);
    }

    /// Number of committed records across all origins
    #[must_use]
    pub fn len(&self) -> usize {
        self.origins.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether no records have been committed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot all origins and their records, in recorded order
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<InteractionRecord>> {
        self.origins
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// Transport wrapper that records every exchange passing through it
///
/// Dispatch is forwarded to the wrapped transport unchanged; the caller's
/// handler is decorated so the full lifecycle is observed without altering
/// response delivery.
pub struct RecordingTransport {
    inner: Arc<dyn Transport>,
    store: Arc<RecordStore>,
    correlator: Arc<BodyCorrelator>,
    pending: Arc<PendingRequests>,
}

impl RecordingTransport {
    /// Wrap `inner`, committing records into `store`
    #[must_use]
    pub fn new(
        inner: Arc<dyn Transport>,
        store: Arc<RecordStore>,
        correlator: Arc<BodyCorrelator>,
        pending: Arc<PendingRequests>,
    ) -> Self {
        Self {
            inner,
            store,
            correlator,
            pending,
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn dispatch(
        &self,
        request: DispatchRequest,
        handler: &mut dyn DispatchHandler,
    ) -> Result<()> {
        let mut recording = RecordingHandler {
            record: Some(InteractionRecord::for_request(&request)),
            has_body: request.body.is_some(),
            store: Arc::clone(&self.store),
            correlator: Arc::clone(&self.correlator),
            pending: Arc::clone(&self.pending),
            caller: handler,
        };

        self.inner.dispatch(request, &mut recording).await
    }
}

/// Decorating handler accumulating one record over the dispatch lifecycle
struct RecordingHandler<'a> {
    record: Option<InteractionRecord>,
    has_body: bool,
    store: Arc<RecordStore>,
    correlator: Arc<BodyCorrelator>,
    pending: Arc<PendingRequests>,
    caller: &'a mut dyn DispatchHandler,
}

impl DispatchHandler for RecordingHandler<'_> {
    fn on_request_start(&mut self) {
        self.pending.begin();

        if let Some(record) = self.record.as_mut() {
            if self.has_body && !record.request_headers.is_empty() {
                record.request_body = self.correlator.take(
                    &record.method,
                    &record.origin,
                    &record.path,
                    &record.request_headers,
                );
            }
        }

        self.caller.on_request_start();
    }

    fn on_response_start(&mut self, status: u16, headers: BTreeMap<String, String>) {
        if let Some(record) = self.record.as_mut() {
            record.status_code = Some(status);
            record.response_headers = Some(headers.clone());
        }

        self.caller.on_response_start(status, headers);
    }

    fn on_response_data(&mut self, chunk: Bytes) {
        if let Some(record) = self.record.as_mut() {
            record.response_chunks.push(chunk.clone());
        }

        self.caller.on_response_data(chunk);
    }

    fn on_response_end(&mut self, trailers: BTreeMap<String, String>) {
        self.pending.complete();

        if let Some(mut record) = self.record.take() {
            if !trailers.is_empty() {
                record.trailers = Some(trailers.clone());
            }
            self.store.commit(record);
        }

        self.caller.on_response_end(trailers);
    }

    fn on_response_error(&mut self, error: &RetakeError) {
        // Retained on the record but never committed: commit happens only at
        // normal completion, so errored exchanges stay out of the fixture.
        if let Some(record) = self.record.as_mut() {
            record.error = Some(error.to_string());
        }

        self.caller.on_response_error(error);
    }
}
