//! Model-backed processing steps.
//!
//! Each capability is a trait with a real adapter (an external command, an HTTP
//! service or an in-process model) and a mock used by the tests.

pub mod command;
pub mod denoiser;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod separator;
pub mod synthesizer;
pub mod transcriber;
pub mod translator;
pub mod whisper;

use std::sync::{Arc, Mutex};

pub use command::{CommandExecutor, CommandTemplate, MockCommandExecutor, SystemCommandExecutor};
pub use denoiser::{DeepFilterDenoiser, Denoiser, MockDenoiser};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaTranslator};
pub use separator::{DemucsSeparator, MockSeparator, Separator, Stems};
pub use synthesizer::{CommandSynthesizer, MockSynthesizer, SynthesisRequest, Synthesizer};
pub use transcriber::{CommandTranscriber, MockTranscriber, Segment, Transcriber, join_segments};
pub use translator::{MockTranslator, Translation, TranslationOutcome, Translator, synthesis_language};
pub use whisper::{WhisperConfig, WhisperTranscriber};

/// Shared, ordered record of mock invocations.
///
/// Clones share the same log, so one log handed to several mocks shows the order in
/// which the pipeline called them.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, entry: impl Into<String>) {
        let mut entries = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
