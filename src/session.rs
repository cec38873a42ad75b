//! Session state machine selecting the active transport

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Config;
use crate::network::HttpClient;
use crate::recording::{
    wait_for_quiescence, BodyCorrelator, PendingRequests, RecordStore, RecordingTransport,
};
use crate::replay::PlaybackTransport;
use crate::storage::{FixtureCache, FixtureWriter};
use crate::transport::{RequestOptions, Transport};
use crate::{Result, RetakeError};

/// Mode of an active session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Capturing live traffic into a fixture
    Recording,
    /// Serving a previously recorded fixture
    Replaying,
}

enum ActiveSession {
    Recording {
        id: String,
        transport: Arc<RecordingTransport>,
        store: Arc<RecordStore>,
        correlator: Arc<BodyCorrelator>,
        pending: Arc<PendingRequests>,
    },
    Replaying {
        id: String,
        transport: Arc<PlaybackTransport>,
    },
}

/// Top-level record/replay engine
///
/// Owns all session state as a plain value, so each test run constructs its
/// own engine instead of sharing process globals. At most one session
/// (recording or replaying) is active per engine; enabling a new one first
/// tears the old one down completely.
pub struct MockEngine {
    config: Config,
    real: Arc<dyn Transport>,
    writer: FixtureWriter,
    cache: FixtureCache,
    active: Option<ActiveSession>,
}

impl MockEngine {
    /// Create an engine dispatching live traffic through `real`
    #[must_use]
    pub fn new(config: Config, real: Arc<dyn Transport>) -> Self {
        let writer = FixtureWriter::new(config.fixtures_dir.clone());
        let cache = FixtureCache::new(config.fixtures_dir.clone());

        Self {
            config,
            real,
            writer,
            cache,
            active: None,
        }
    }

    /// Create an engine over the default pooled HTTP client
    #[must_use]
    pub fn with_default_client(config: Config) -> Self {
        Self::new(config, Arc::new(HttpClient::new()))
    }

    /// Start a session replaying fixture `session_id`, or recording it when
    /// `update` is true
    ///
    /// Any currently active session is fully torn down first; a recording
    /// session persists its fixture before the new session starts.
    ///
    /// # Errors
    ///
    /// Returns error if tearing down the previous session fails, or if the
    /// fixture for a replay session cannot be loaded
    pub async fn enable(&mut self, session_id: &str, update: bool) -> Result<String> {
        if self.active.is_some() {
            self.disable().await?;
        }

        if update {
            let store = Arc::new(RecordStore::new());
            let correlator = Arc::new(BodyCorrelator::new());
            let pending = Arc::new(PendingRequests::new());
            let transport = Arc::new(RecordingTransport::new(
                Arc::clone(&self.real),
                Arc::clone(&store),
                Arc::clone(&correlator),
                Arc::clone(&pending),
            ));

            self.active = Some(ActiveSession::Recording {
                id: session_id.to_string(),
                transport,
                store,
                correlator,
                pending,
            });
        } else {
            let fixture = self.cache.load(session_id).await?;
            let transport = Arc::new(PlaybackTransport::from_fixture(&fixture));

            self.active = Some(ActiveSession::Replaying {
                id: session_id.to_string(),
                transport,
            });
        }

        let message = format!(
            "mocking started for {session_id}{}",
            if update { " (updating)" } else { "" }
        );
        info!("{message}");
        Ok(message)
    }

    /// Stop the active session
    ///
    /// A recording session waits for in-flight requests to drain (bounded)
    /// and persists its fixture; a replaying session drops its cached
    /// fixture so the next replay reloads from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RetakeError::NotEnabled`] when no session is active, or the
    /// persistence failure of a recording session
    pub async fn disable(&mut self) -> Result<String> {
        let Some(active) = self.active.take() else {
            return Err(RetakeError::NotEnabled);
        };

        let message = match active {
            ActiveSession::Recording {
                id, store, pending, ..
            } => {
                wait_for_quiescence(&pending, &self.config.quiesce).await;
                self.writer.persist(&id, &store).await?;
                format!("mocking stopped for {id} (fixture updated)")
            }
            ActiveSession::Replaying { id, .. } => {
                self.cache.evict(&id);
                format!("mocking stopped for {id}")
            }
        };

        info!("{message}");
        Ok(message)
    }

    /// Whether a session is active
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Id of the active session, if any
    #[must_use]
    pub fn active_id(&self) -> Option<&str> {
        match &self.active {
            Some(
                ActiveSession::Recording { id, .. } | ActiveSession::Replaying { id, .. },
            ) => Some(id.as_str()),
            None => None,
        }
    }

    /// Mode of the active session, if any
    #[must_use]
    pub fn mode(&self) -> Option<SessionMode> {
        match &self.active {
            Some(ActiveSession::Recording { .. }) => Some(SessionMode::Recording),
            Some(ActiveSession::Replaying { .. }) => Some(SessionMode::Replaying),
            None => None,
        }
    }

    /// When the fixture being replayed was recorded, if replaying
    #[must_use]
    pub fn fixture_recorded_at(&self) -> Option<DateTime<Utc>> {
        match &self.active {
            Some(ActiveSession::Replaying { transport, .. }) => transport.recorded_at(),
            _ => None,
        }
    }

    /// Transport for the active session
    ///
    /// While recording, the request's logical body is first handed to the
    /// correlator so the interceptor can attach it to the record it captures
    /// for this dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`RetakeError::NotEnabled`] when no session is active
    pub fn transport(&self, url: &str, options: &RequestOptions) -> Result<Arc<dyn Transport>> {
        match &self.active {
            None => Err(RetakeError::NotEnabled),
            Some(ActiveSession::Recording {
                transport,
                correlator,
                ..
            }) => {
                if let Some(body) = options.body.as_deref() {
                    if !options.headers.is_empty() {
                        correlator.save(&options.method, url, &options.headers, body);
                    }
                }
                Ok(Arc::clone(transport) as Arc<dyn Transport>)
            }
            Some(ActiveSession::Replaying { transport, .. }) => {
                Ok(Arc::clone(transport) as Arc<dyn Transport>)
            }
        }
    }

    /// Transport to use for a request in the engine's current state
    ///
    /// Unlike [`Self::transport`], falls back to the real transport when no
    /// session is active.
    #[must_use]
    pub fn select_transport(&self, url: &str, options: &RequestOptions) -> Arc<dyn Transport> {
        match self.transport(url, options) {
            Ok(transport) => transport,
            Err(_) => Arc::clone(&self.real),
        }
    }
}
