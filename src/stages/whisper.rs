//! Whisper-based speech-to-text transcription.
//!
//! This module provides an in-process Whisper implementation of the Transcriber trait
//! using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::audio::buffer::AudioBuffer;
use crate::audio::resample::resample;
use crate::audio::wav::read_wav;
use crate::defaults;
use crate::error::{RedubError, Result};
use crate::pipeline::stage::Stage;
use crate::stages::transcriber::{Segment, Transcriber};
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use tracing::info;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the ggml model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es"), or "auto"
    pub language: String,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-large-v3-turbo.bin"),
            language: defaults::SOURCE_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Whisper-based transcriber implementation.
///
/// The WhisperContext is wrapped in a Mutex so the transcriber stays `Sync`.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper-based transcriber placeholder (without whisper feature).
///
/// Construction succeeds so configuration can be validated; transcribing fails.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

fn model_name_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn check_model(config: &WhisperConfig) -> Result<()> {
    if config.model_path.exists() {
        Ok(())
    } else {
        Err(RedubError::ConfigInvalidValue {
            key: "transcription.whisper_model".to_string(),
            message: format!("model file not found: {}", config.model_path.display()),
        })
    }
}

/// Load `audio` as 16 kHz mono, the input format Whisper expects.
pub fn load_for_whisper(audio: &Path) -> Result<Vec<f32>> {
    let buffer = read_wav(audio)?;
    let mono = AudioBuffer::mono(buffer.mono_mix(), buffer.sample_rate());
    let resampled = resample(&mono, defaults::WHISPER_SAMPLE_RATE)?;
    Ok(resampled.into_channels().into_iter().next().unwrap_or_default())
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Create a new Whisper transcriber, loading the model.
    ///
    /// # Errors
    /// Returns `ConfigInvalidValue` if the model file doesn't exist and `StageFailed`
    /// if model loading fails.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        check_model(&config)?;
        let model_name = model_name_of(&config.model_path);

        let context = WhisperContext::new_with_params(
            config.model_path.to_str().ok_or_else(|| {
                RedubError::stage(Stage::Transcribe, "Invalid UTF-8 in model path")
            })?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| RedubError::stage(Stage::Transcribe, format!("Failed to load Whisper model: {}", e)))?;

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Create a new Whisper transcriber (stub implementation).
    pub fn new(config: WhisperConfig) -> Result<Self> {
        check_model(&config)?;
        let model_name = model_name_of(&config.model_path);
        Ok(Self { config, model_name })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>> {
        let samples = load_for_whisper(audio)?;
        info!(
            "Transcribing {:.1}s of audio with {}",
            samples.len() as f64 / f64::from(defaults::WHISPER_SAMPLE_RATE),
            self.model_name
        );

        let fail = |message: String| RedubError::stage(Stage::Transcribe, message);

        let context = self
            .context
            .lock()
            .map_err(|e| fail(format!("Failed to acquire context lock: {}", e)))?;
        let mut state = context
            .create_state()
            .map_err(|e| fail(format!("Failed to create Whisper state: {}", e)))?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: 5,
            patience: -1.0,
        });
        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples)
            .map_err(|e| fail(format!("Whisper inference failed: {}", e)))?;

        // timestamps are in centiseconds
        let segments = state
            .as_iter()
            .map(|segment| Segment {
                start: segment.start_timestamp() as f64 / 100.0,
                end: segment.end_timestamp() as f64 / 100.0,
                text: segment.to_string().trim().to_string(),
            })
            .collect();
        Ok(segments)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, _audio: &Path) -> Result<Vec<Segment>> {
        Err(RedubError::stage(
            Stage::Transcribe,
            concat!(
                "Whisper feature not enabled. This binary was built without in-process speech recognition.\n",
                "To fix: cargo build --release --features whisper, or set transcription.backend = \"command\""
            ),
        ))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
