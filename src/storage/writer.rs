//! Fixture serialization and persistence

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::recording::{InteractionRecord, RecordStore};
use crate::{Result, RetakeError};

use super::format::{fixture_path, FixtureFile, SerializedRecord};

/// Writes recording sessions out as pretty-printed JSON fixtures
pub struct FixtureWriter {
    fixtures_dir: PathBuf,
}

impl FixtureWriter {
    /// Create a writer rooted at the given fixtures directory
    #[must_use]
    pub fn new(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_dir: fixtures_dir.into(),
        }
    }

    /// The directory fixtures are written under
    #[must_use]
    pub fn fixtures_dir(&self) -> &Path {
        &self.fixtures_dir
    }

    /// Persist the session's committed records, returning the fixture path
    ///
    /// Stamps the document with a fresh generation time and creates the
    /// fixtures directory if absent (idempotent).
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the filesystem write fails
    pub async fn persist(&self, session_id: &str, store: &RecordStore) -> Result<PathBuf> {
        let mocks = store
            .snapshot()
            .into_iter()
            .map(|(origin, records)| (origin, records.iter().map(serialize_record).collect()))
            .collect();

        let fixture = FixtureFile {
            timestamp: Utc::now().to_rfc3339(),
            mocks,
        };

        let json = serde_json::to_string_pretty(&fixture).map_err(|e| {
            RetakeError::FixtureSerialize {
                session_id: session_id.to_string(),
                source: e,
            }
        })?;

        tokio::fs::create_dir_all(&self.fixtures_dir).await?;

        let path = fixture_path(&self.fixtures_dir, session_id);
        tokio::fs::write(&path, json).await?;

        info!(
            "persisted fixture for session {session_id}: {} record(s) at {}",
            store.len(),
            path.display()
        );

        Ok(path)
    }
}

/// Convert a recording-time record into its on-disk form
///
/// Response chunks concatenate into one buffer before the single text
/// decode; errors reduce to their message text.
fn serialize_record(record: &InteractionRecord) -> SerializedRecord {
    let mut body = Vec::new();
    for chunk in &record.response_chunks {
        body.extend_from_slice(chunk);
    }

    SerializedRecord {
        method: record.method.clone(),
        path: record.path.clone(),
        request_body: record.request_body.clone(),
        status_code: record.status_code,
        response_headers: record.response_headers.clone().unwrap_or_default(),
        response_body: String::from_utf8_lossy(&body).into_owned(),
        trailers: record.trailers.clone(),
        error: record.error.clone(),
    }
}
