//! Playback engine serving recorded responses without network access

mod rules;
mod transport;

pub use rules::{MatchRule, RecordedReply, RuleSet};
pub use transport::PlaybackTransport;

/// Status code replayed when a record carries none
pub const DEFAULT_STATUS: u16 = 200;
