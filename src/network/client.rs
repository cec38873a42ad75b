//! Pooled HTTP client used when recording against live upstreams

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::transport::{DispatchHandler, DispatchRequest, Transport};
use crate::{Result, RetakeError};

use super::{POOL_IDLE_TIMEOUT_MS, POOL_MAX_IDLE_PER_HOST};

/// Pooled HTTP client implementing [`Transport`]
///
/// The thin live-traffic adapter: it drives the dispatch lifecycle from a
/// real response, streaming body frames as they arrive.
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpClient {
    /// Create a new HTTP client
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_millis(POOL_IDLE_TIMEOUT_MS))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build_http();

        Self { client }
    }

    async fn run(
        &self,
        request: &DispatchRequest,
        handler: &mut dyn DispatchHandler,
    ) -> Result<()> {
        let uri = build_uri(&request.origin, &request.path)?;
        let method = request.method.parse::<Method>().map_err(|e| {
            RetakeError::Transport(format!("invalid HTTP method '{}': {e}", request.method))
        })?;

        debug!("dispatching {} {uri}", request.method);

        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = request.body.clone().unwrap_or_default();
        let http_request = builder
            .body(Full::new(body))
            .map_err(|e| RetakeError::Transport(format!("failed to build request: {e}")))?;

        let response = self
            .client
            .request(http_request)
            .await
            .map_err(|e| RetakeError::Transport(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid>").to_string(),
                )
            })
            .collect();
        handler.on_response_start(status, headers);

        let mut body = response.into_body();
        let mut trailers = BTreeMap::new();
        while let Some(next) = body.frame().await {
            let frame = next.map_err(|e| {
                RetakeError::Transport(format!("failed to read response body: {e}"))
            })?;

            match frame.into_data() {
                Ok(chunk) => handler.on_response_data(chunk),
                Err(frame) => {
                    if let Ok(trailer_map) = frame.into_trailers() {
                        for (name, value) in &trailer_map {
                            trailers.insert(
                                name.to_string(),
                                value.to_str().unwrap_or("<invalid>").to_string(),
                            );
                        }
                    }
                }
            }
        }

        handler.on_response_end(trailers);
        Ok(())
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn dispatch(
        &self,
        request: DispatchRequest,
        handler: &mut dyn DispatchHandler,
    ) -> Result<()> {
        handler.on_request_start();

        let outcome = self.run(&request, handler).await;
        if let Err(error) = &outcome {
            warn!("{} {} failed: {error}", request.method, request.url());
            handler.on_response_error(error);
        }

        outcome
    }
}

/// Build a URI from origin and path
fn build_uri(origin: &str, path: &str) -> Result<Uri> {
    let uri = format!("{origin}{path}");
    uri.parse::<Uri>()
        .map_err(|e| RetakeError::Transport(format!("invalid URI '{uri}': {e}")))
}
