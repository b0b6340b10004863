//! Per-file processing stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the per-file redub flow, in execution order.
///
/// Failures are tagged with the stage they happened in; the tag's label is what ends
/// up in the manifest error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Create the scratch workspace.
    Workspace,
    /// Optional noise suppression.
    Denoise,
    /// Vocal / background source separation.
    Separate,
    /// Speech-to-text on the vocal stem.
    Transcribe,
    /// Transcript translation.
    Translate,
    /// Voice-cloned synthesis of the translation.
    Synthesize,
    /// Combine the dub with the background stem (or copy it through).
    Mix,
    /// Move the result into place and record it.
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Workspace,
        Stage::Denoise,
        Stage::Separate,
        Stage::Transcribe,
        Stage::Translate,
        Stage::Synthesize,
        Stage::Mix,
        Stage::Finalize,
    ];

    /// Label used in logs and manifest error strings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Denoise => "denoise",
            Self::Separate => "separate",
            Self::Transcribe => "transcribe",
            Self::Translate => "translate",
            Self::Synthesize => "synthesize",
            Self::Mix => "mix",
            Self::Finalize => "finalize",
        }
    }

    /// Whether a failure here aborts the file.
    pub fn is_mandatory(self) -> bool {
        !matches!(self, Self::Denoise)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
