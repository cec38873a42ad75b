//! JSON fixture storage
//!
//! One fixture document per session id, persisted under the configured
//! fixtures directory as `<session id>.json`.

mod format;
mod reader;
mod writer;

pub use format::{fixture_path, FixtureFile, SerializedRecord, FIXTURE_EXTENSION};
pub use reader::{FixtureCache, LoadedFixture};
pub use writer::FixtureWriter;
