//! Transport contract shared by the real client, the recorder, and playback

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{Result, RetakeError};

/// One dispatched HTTP request, as seen by a [`Transport`]
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Origin (scheme + host + port), e.g. `http://127.0.0.1:8080`
    pub origin: String,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Opaque request body, if any
    pub body: Option<Bytes>,
}

impl DispatchRequest {
    /// Full request URL (origin + path)
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.origin, self.path)
    }
}

/// Logical view of a request at the call boundary
///
/// The dispatch layer only ever sees an opaque body stream; this is the
/// caller-side shape that still carries the textual body, used to correlate
/// bodies with the records the recorder accumulates.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method
    pub method: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Textual request body, if any
    pub body: Option<String>,
}

/// Listener over the dispatch lifecycle of one request
///
/// Callbacks arrive in a fixed order: `on_request_start`, then either
/// `on_response_start` followed by zero or more `on_response_data` and a
/// final `on_response_end`, or `on_response_error`. Each callback runs to
/// completion before the transport yields again.
pub trait DispatchHandler: Send {
    /// The request is about to be sent
    fn on_request_start(&mut self);

    /// Status code and response headers arrived
    fn on_response_start(&mut self, status: u16, headers: BTreeMap<String, String>);

    /// One raw response chunk arrived
    fn on_response_data(&mut self, chunk: Bytes);

    /// The response completed normally
    fn on_response_end(&mut self, trailers: BTreeMap<String, String>);

    /// The request failed before completing
    fn on_response_error(&mut self, error: &RetakeError);
}

/// Something that can dispatch HTTP requests
///
/// Implemented by the real client, the recording interceptor that wraps it,
/// and the playback fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch one request, driving `handler` through the lifecycle
    ///
    /// # Errors
    ///
    /// Returns error if the request could not be completed; the same failure
    /// is also surfaced through [`DispatchHandler::on_response_error`].
    async fn dispatch(
        &self,
        request: DispatchRequest,
        handler: &mut dyn DispatchHandler,
    ) -> Result<()>;
}

/// A [`DispatchHandler`] that buffers the response it observes
#[derive(Debug, Default)]
pub struct ResponseCollector {
    /// Response status code, once headers arrived
    pub status: Option<u16>,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Raw body chunks in arrival order
    pub chunks: Vec<Bytes>,
    /// Response trailers
    pub trailers: BTreeMap<String, String>,
    /// Error message, if the request failed
    pub error: Option<String>,
    /// Whether `on_response_end` was observed
    pub completed: bool,
}

impl ResponseCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenated response body, decoded as UTF-8 (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        let mut buffer = Vec::new();
        for chunk in &self.chunks {
            buffer.extend_from_slice(chunk);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl DispatchHandler for ResponseCollector {
    fn on_request_start(&mut self) {}

    fn on_response_start(&mut self, status: u16, headers: BTreeMap<String, String>) {
        self.status = Some(status);
        self.headers = headers;
    }

    fn on_response_data(&mut self, chunk: Bytes) {
        self.chunks.push(chunk);
    }

    fn on_response_end(&mut self, trailers: BTreeMap<String, String>) {
        self.trailers = trailers;
        self.completed = true;
    }

    fn on_response_error(&mut self, error: &RetakeError) {
        self.error = Some(error.to_string());
    }
}
