//! Fixture loading with per-process caching

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::{Result, RetakeError};

use super::format::{fixture_path, FixtureFile, SerializedRecord};

/// A fixture document parsed into memory
#[derive(Debug, Clone)]
pub struct LoadedFixture {
    /// Generation time string as recorded in the document
    pub timestamp: String,
    /// Origin -> recorded exchanges, in recorded order
    pub mocks: BTreeMap<String, Vec<SerializedRecord>>,
}

impl LoadedFixture {
    /// Generation time parsed as a datetime, if well-formed
    #[must_use]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Loads fixtures and caches them for the lifetime of the process
///
/// Repeated replays of the same session id skip redundant disk reads. An
/// entry is evicted when its session is disabled, forcing a reload on next
/// use.
pub struct FixtureCache {
    fixtures_dir: PathBuf,
    loaded: DashMap<String, Arc<LoadedFixture>>,
}

impl FixtureCache {
    /// Create a cache reading from the given fixtures directory
    #[must_use]
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_dir: fixtures_dir.into(),
            loaded: DashMap::new(),
        }
    }

    /// Load the fixture for a session id, reading from disk at most once
    ///
    /// # Errors
    ///
    /// Fails hard when the file is missing or cannot be parsed; replay never
    /// falls back to live traffic.
    pub async fn load(&self, session_id: &str) -> Result<Arc<LoadedFixture>> {
        if let Some(fixture) = self.loaded.get(session_id) {
            debug!("fixture cache hit for session {session_id}");
            return Ok(Arc::clone(&fixture));
        }

        let path = fixture_path(&self.fixtures_dir, session_id);
        if !path.exists() {
            return Err(RetakeError::FixtureNotFound(path));
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let file: FixtureFile =
            serde_json::from_str(&contents).map_err(|e| RetakeError::FixtureParse {
                path: path.clone(),
                source: e,
            })?;

        let record_count: usize = file.mocks.values().map(Vec::len).sum();
        info!(
            "loaded fixture for session {session_id}: {record_count} record(s) from {}",
            path.display()
        );

        let fixture = Arc::new(LoadedFixture {
            timestamp: file.timestamp,
            mocks: file.mocks,
        });
        self.loaded
            .insert(session_id.to_string(), Arc::clone(&fixture));

        Ok(fixture)
    }

    /// Drop the cached entry for a session id
    pub fn evict(&self, session_id: &str) {
        self.loaded.remove(session_id);
    }

    /// Number of fixtures currently cached
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.loaded.len()
    }
}
