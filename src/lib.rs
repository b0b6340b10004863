//! redub - batch voice redubbing
//!
//! Separates speech from background, transcribes and translates it, re-voices the
//! translation in the original speaker's voice and mixes it back over the background.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod stages;
pub mod state;

// Capability traits
pub use stages::{Denoiser, Separator, Synthesizer, Transcriber, Translator};

// Pipeline
pub use batch::{BatchOptions, BatchSummary, run_batch};
pub use pipeline::{Capabilities, FileOutcome, PipelineConfig, PipelineOrchestrator, Stage};

// Mixing and state
pub use audio::{AudioBuffer, AudioSynchronizer};
pub use state::JobStateStore;

// Error handling
pub use error::{RedubError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
