//! Retake - Deterministic record-replay HTTP mocking engine for tests
//!
//! Record real upstream traffic into a JSON fixture, then replay it later
//! without touching the network.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod headers;
pub mod network;
pub mod recording;
pub mod replay;
pub mod session;
pub mod storage;
pub mod transport;

pub use error::{Result, RetakeError};
pub use session::MockEngine;
pub use transport::{DispatchHandler, DispatchRequest, RequestOptions, Transport};
