//! Test harness for Portcullis.
//!
//! Provides in-memory message types implementing the validator's message
//! traits, and loaders for the YAML specifications under `fixtures/`.

pub mod fixtures;
pub mod message;

pub use fixtures::{fixture_path, load_fixture, load_fixture_with, FixtureError};
pub use message::{TestRequest, TestResponse, TestWebhookRequest};
