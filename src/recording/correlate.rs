//! Request body correlation
//!
//! The textual request body available at the call boundary is not the same
//! object the recorder observes when decorating the dispatch step, which
//! only exposes an opaque stream. This side map joins the two on a
//! heuristic key.

use dashmap::DashMap;

use crate::headers::content_length;

/// Side map joining outgoing textual bodies to the records that capture them
///
/// Keys have the form `"{method} {content-length} {url}"`. At most one body
/// is pending per exact key; concurrent identical requests race on the entry
/// last-write-wins. Best-effort join, not a correctness guarantee.
#[derive(Debug, Default)]
pub struct BodyCorrelator {
    bodies: DashMap<String, String>,
}

impl BodyCorrelator {
    /// Create an empty correlator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the textual body of a request about to be dispatched
    pub fn save(&self, method: &str, url: &str, headers: &[(String, String)], body: &str) {
        let key = join_key(method, content_length(headers), url);
        self.bodies.insert(key, body.to_string());
    }

    /// Claim the body stored for a dispatched request, removing the entry
    #[must_use]
    pub fn take(
        &self,
        method: &str,
        origin: &str,
        path: &str,
        headers: &[(String, String)],
    ) -> Option<String> {
        let url = format!("{origin}{path}");
        let key = join_key(method, content_length(headers), &url);
        self.bodies.remove(&key).map(|(_, body)| body)
    }

    /// Number of bodies awaiting correlation
    #[must_use]
    pub fn pending(&self) -> usize {
        self.bodies.len()
    }
}

fn join_key(method: &str, content_length: u64, url: &str) -> String {
    format!("{method} {content_length} {url}")
}
