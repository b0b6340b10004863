//! Error types for redub.

use crate::pipeline::stage::Stage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedubError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Batch errors
    #[error("Input directory not found: {path}")]
    InputDirNotFound { path: String },

    #[error("Failed to acquire processing workspace: {message}")]
    WorkspaceAcquisition { message: String },

    #[error("{stage} stage failed: {message}")]
    StageFailed { stage: Stage, message: String },

    // Audio errors
    #[error("Failed to read WAV file {path}: {message}")]
    WavRead { path: String, message: String },

    #[error("Failed to write WAV file {path}: {message}")]
    WavWrite { path: String, message: String },

    #[error("Resampling from {from}Hz to {to}Hz failed: {message}")]
    Resample { from: u32, to: u32, message: String },

    #[error("Time stretch failed: {message}")]
    Stretch { message: String },

    #[error("Silence trimming failed: {message}")]
    Trim { message: String },

    #[error("Mixing failed: {message}")]
    Mix { message: String },

    // External tool errors
    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("External tool {tool} exited with {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: String,
        stderr: String,
    },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl RedubError {
    /// Tag an error as the failure of a mandatory stage.
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        RedubError::StageFailed {
            stage,
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RedubError>;
