//! One-shot request match rules

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::storage::SerializedRecord;
use crate::transport::DispatchRequest;

use super::DEFAULT_STATUS;

/// Response payload replayed when a rule matches
#[derive(Debug, Clone)]
pub struct RecordedReply {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Response body text
    pub body: String,
    /// Response trailers
    pub trailers: BTreeMap<String, String>,
}

/// A playback constraint consumed at most once
///
/// Matches on method and path. When a non-empty request body was recorded,
/// the outgoing body's length must equal the recorded body's length; content
/// is deliberately not compared byte-for-byte since recorded payloads may
/// embed non-deterministic values.
#[derive(Debug)]
pub struct MatchRule {
    method: String,
    path: String,
    body_length: Option<usize>,
    reply: RecordedReply,
    consumed: bool,
}

impl MatchRule {
    /// Build the rule for one recorded exchange
    #[must_use]
    pub fn from_record(record: &SerializedRecord) -> Self {
        let body_length = record
            .request_body
            .as_ref()
            .filter(|body| !body.is_empty())
            .map(String::len);

        Self {
            method: record.method.clone(),
            path: record.path.clone(),
            body_length,
            reply: RecordedReply {
                status: record.status_code.unwrap_or(DEFAULT_STATUS),
                headers: record.response_headers.clone(),
                body: record.response_body.clone(),
                trailers: record.trailers.clone().unwrap_or_default(),
            },
            consumed: false,
        }
    }

    fn matches(&self, request: &DispatchRequest) -> bool {
        if self.consumed || self.method != request.method || self.path != request.path {
            return false;
        }

        match self.body_length {
            Some(length) => request
                .body
                .as_ref()
                .is_some_and(|body| body.len() == length),
            None => true,
        }
    }
}

/// Ordered one-shot rules for a single origin
///
/// Rules register in recording order; duplicate `{method, path, body length}`
/// combinations are consumed strictly in that order, reproducing sequences
/// such as pagination or evolving retry responses.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Mutex<Vec<MatchRule>>,
}

impl RuleSet {
    /// Create an empty rule set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule at the end of the consumption order
    pub fn register(&self, rule: MatchRule) {
        self.rules.lock().expect("rule set lock poisoned").push(rule);
    }

    /// Consume the first unconsumed rule matching the request, retiring it
    #[must_use]
    pub fn consume(&self, request: &DispatchRequest) -> Option<RecordedReply> {
        let mut rules = self.rules.lock().expect("rule set lock poisoned");
        for rule in rules.iter_mut() {
            if rule.matches(request) {
                rule.consumed = true;
                return Some(rule.reply.clone());
            }
        }

        None
    }

    /// Number of rules not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rules
            .lock()
            .expect("rule set lock poisoned")
            .iter()
            .filter(|rule| !rule.consumed)
            .count()
    }
}
