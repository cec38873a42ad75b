//! Fake transport replaying recorded fixtures

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::storage::LoadedFixture;
use crate::transport::{DispatchHandler, DispatchRequest, Transport};
use crate::{Result, RetakeError};

use super::rules::{MatchRule, RuleSet};

/// Network-deny-by-default transport serving one-shot recorded replies
///
/// Built from a loaded fixture, one rule per recorded exchange. Any request
/// without a registered match is a hard failure; nothing ever reaches the
/// network.
pub struct PlaybackTransport {
    origins: HashMap<String, RuleSet>,
    timestamp: String,
}

impl PlaybackTransport {
    /// Build the fake transport from a loaded fixture
    #[must_use]
    pub fn from_fixture(fixture: &LoadedFixture) -> Self {
        let mut origins = HashMap::new();

        for (origin, records) in &fixture.mocks {
            let rules = RuleSet::new();
            for record in records {
                rules.register(MatchRule::from_record(record));
            }
            origins.insert(origin.clone(), rules);
        }

        Self {
            origins,
            timestamp: fixture.timestamp.clone(),
        }
    }

    /// When the replayed fixture was recorded, if well-formed
    #[must_use]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Rules not yet consumed, across all origins
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.origins.values().map(RuleSet::remaining).sum()
    }
}

#[async_trait]
impl Transport for PlaybackTransport {
    async fn dispatch(
        &self,
        request: DispatchRequest,
        handler: &mut dyn DispatchHandler,
    ) -> Result<()> {
        let reply = self
            .origins
            .get(&request.origin)
            .and_then(|rules| rules.consume(&request));

        handler.on_request_start();

        match reply {
            Some(reply) => {
                debug!(
                    "replaying {} {}{} -> {}",
                    request.method, request.origin, request.path, reply.status
                );

                handler.on_response_start(reply.status, reply.headers);
                if !reply.body.is_empty() {
                    handler.on_response_data(Bytes::from(reply.body));
                }
                handler.on_response_end(reply.trailers);
                Ok(())
            }
            None => {
                warn!(
                    "denied unmocked request {} {}{}",
                    request.method, request.origin, request.path
                );

                let error = RetakeError::UnmatchedRequest {
                    origin: request.origin,
                    method: request.method,
                    path: request.path,
                };
                handler.on_response_error(&error);
                Err(error)
            }
        }
    }
}
