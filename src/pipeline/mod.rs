//! Per-file processing pipeline.

pub mod orchestrator;
pub mod stage;
pub mod workspace;

pub use orchestrator::{
    Capabilities, DegradedTranslationPolicy, DenoiseTarget, FileOutcome, PipelineConfig,
    PipelineOrchestrator,
};
pub use stage::Stage;
pub use workspace::ProcessingWorkspace;
