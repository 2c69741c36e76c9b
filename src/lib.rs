//! # Lox Conformance Test Runner
//!
//! Drives an external Lox interpreter against a directory of `.lox` script
//! fixtures, one fixture at a time, and reports pass/fail per fixture plus an
//! aggregate result.
//!
//! ## Architecture
//!
//! The framework is organized into several modules:
//! - `config`: Configuration and subject binary selection
//! - `discovery`: Fixture discovery and filtering
//! - `execution`: Child process launch and live output relay
//! - `recording`: Pass/fail classification and result accumulation
//! - `reporting`: Console progress and summary output
//! - `harness`: Orchestration of a full suite run

pub mod config;
pub mod discovery;
pub mod execution;
pub mod harness;
pub mod recording;
pub mod reporting;

// Re-exports for easier access
pub use config::{Profile, TestConfig};
pub use discovery::{Fixture, FixtureLocator};
pub use execution::{Completion, OutputSink, ProcessRunner, RunOutput, Stream};
pub use harness::{HarnessBuilder, LoxHarness};
pub use recording::{ResultRecorder, RunOutcome, SuiteResult, TestStatus};
pub use reporting::Reporter;

/// Current version of the test runner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Test runner errors
#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Fixture discovery failed: {0}")]
    Discovery(String),

    #[error("Failed to launch {binary}: {reason}")]
    Launch { binary: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}
