//! On-disk fixture document types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File extension of fixture documents
pub const FIXTURE_EXTENSION: &str = "json";

/// One recorded exchange, text-normalized on-disk form
///
/// Derived from a recording-time record at persist time and never mutated
/// after. Response bodies are concatenated into one text string; binary
/// content is not round-tripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedRecord {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Textual request body, when one was correlated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    /// Response status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response headers
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    /// Concatenated response body text
    #[serde(default)]
    pub response_body: String,
    /// Response trailers, when any arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailers: Option<BTreeMap<String, String>>,
    /// Error message text; error identity is not preserved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A persisted recording session
///
/// Order within each origin's sequence equals recording order and becomes
/// the consumption order during replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureFile {
    /// ISO-8601 generation time
    pub timestamp: String,
    /// Origin -> recorded exchanges
    pub mocks: BTreeMap<String, Vec<SerializedRecord>>,
}

/// Path of the fixture file for a session id
#[must_use]
pub fn fixture_path(fixtures_dir: &Path, session_id: &str) -> PathBuf {
    fixtures_dir.join(format!("{session_id}.{FIXTURE_EXTENSION}"))
}
