//! Real HTTP transport backing recording sessions

mod client;

pub use client::HttpClient;

/// Idle pooled connections kept per host
pub const POOL_MAX_IDLE_PER_HOST: usize = 1000;

/// Idle pooled connection timeout
pub const POOL_IDLE_TIMEOUT_MS: u64 = 60_000;
