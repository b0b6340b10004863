//! Batch job state.

pub mod manifest;

pub use manifest::{CompletionMetadata, JobStateStore, JobStatus, ManifestEntry, file_identity};
