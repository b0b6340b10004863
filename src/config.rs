use crate::defaults;
use crate::error::{RedubError, Result};
use crate::pipeline::orchestrator::{DegradedTranslationPolicy, DenoiseTarget};
use crate::stages::command::{CommandTemplate, SystemCommandExecutor};
use crate::stages::denoiser::DeepFilterDenoiser;
use crate::stages::separator::DemucsSeparator;
use crate::stages::synthesizer::CommandSynthesizer;
use crate::stages::transcriber::CommandTranscriber;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub batch: BatchConfig,
    pub denoise: DenoiseConfig,
    pub separation: SeparationConfig,
    pub transcription: TranscriptionConfig,
    pub translation: TranslationConfig,
    pub synthesis: SynthesisConfig,
}

/// Batch run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Target-language label handed to the translator
    pub target_language: String,
    pub limit: Option<usize>,
    pub debug: bool,
    /// Parent directory for per-file workspaces (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
}

/// Noise suppression configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DenoiseConfig {
    pub enabled: bool,
    pub target: DenoiseTarget,
    pub command: Vec<String>,
}

/// Source separation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeparationConfig {
    pub command: Vec<String>,
    /// Model directory names probed after the built-in ones
    pub model_dirs: Vec<String>,
}

/// Speech-to-text backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionBackend {
    /// External command (`whisper` CLI by default)
    #[default]
    Command,
    /// In-process whisper-rs (requires the `whisper` feature)
    Whisper,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backend: TranscriptionBackend,
    pub command: Vec<String>,
    /// Model name passed to the command backend
    pub model: String,
    /// ggml model file for the whisper backend
    pub whisper_model: PathBuf,
    pub language: String,
    pub threads: Option<usize>,
}

/// Translation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    pub ollama_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub degraded_policy: DegradedTranslationPolicy,
}

/// Voice synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub command: Vec<String>,
    /// Pass the original transcript along with the reference audio
    pub use_reference_text: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            limit: None,
            debug: false,
            scratch_dir: None,
            extensions: defaults::AUDIO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: DenoiseTarget::default(),
            command: DeepFilterDenoiser::<SystemCommandExecutor>::default_template().to_argv(),
        }
    }
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            command: DemucsSeparator::<SystemCommandExecutor>::default_template().to_argv(),
            model_dirs: Vec::new(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: TranscriptionBackend::default(),
            command: CommandTranscriber::<SystemCommandExecutor>::default_template().to_argv(),
            model: defaults::TRANSCRIPTION_MODEL.to_string(),
            whisper_model: PathBuf::from("models/ggml-large-v3-turbo.bin"),
            language: defaults::SOURCE_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            ollama_url: defaults::OLLAMA_URL.to_string(),
            model: defaults::OLLAMA_MODEL.to_string(),
            temperature: defaults::TRANSLATION_TEMPERATURE,
            timeout_secs: defaults::TRANSLATION_TIMEOUT_SECS,
            degraded_policy: DegradedTranslationPolicy::default(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            command: CommandSynthesizer::<SystemCommandExecutor>::default_template().to_argv(),
            use_reference_text: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(RedubError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - REDUB_TARGET_LANGUAGE → batch.target_language
    /// - REDUB_OLLAMA_URL → translation.ollama_url
    /// - REDUB_OLLAMA_MODEL → translation.model
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("REDUB_TARGET_LANGUAGE")
            && !language.is_empty()
        {
            self.batch.target_language = language;
        }

        if let Ok(url) = std::env::var("REDUB_OLLAMA_URL")
            && !url.is_empty()
        {
            self.translation.ollama_url = url;
        }

        if let Ok(model) = std::env::var("REDUB_OLLAMA_MODEL")
            && !model.is_empty()
        {
            self.translation.model = model;
        }

        self
    }

    /// Reject values that would only fail later, mid-batch.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| {
            Err(RedubError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };

        if self.batch.target_language.trim().is_empty() {
            return invalid("batch.target_language", "must not be empty");
        }
        if self.batch.extensions.is_empty() {
            return invalid("batch.extensions", "at least one extension is required");
        }
        if !(0.0..=2.0).contains(&self.translation.temperature) {
            return invalid("translation.temperature", "must be between 0.0 and 2.0");
        }
        if self.translation.timeout_secs == 0 {
            return invalid("translation.timeout_secs", "must be positive");
        }
        for (key, argv) in [
            ("denoise.command", &self.denoise.command),
            ("separation.command", &self.separation.command),
            ("transcription.command", &self.transcription.command),
            ("synthesis.command", &self.synthesis.command),
        ] {
            CommandTemplate::from_argv(argv).map_err(|_| RedubError::ConfigInvalidValue {
                key: key.to_string(),
                message: "command must name a program".to_string(),
            })?;
        }
        Ok(())
    }

    /// Look up a value by dotted key (e.g. `translation.model`).
    ///
    /// Sections render as TOML, strings without quotes.
    pub fn get_value_by_path(&self, key: &str) -> Result<String> {
        let root = toml::Value::try_from(self)
            .map_err(|e| RedubError::Other(format!("Failed to serialize config: {}", e)))?;
        let mut current = &root;
        for part in key.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| RedubError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "unknown key".to_string(),
                })?;
        }
        Ok(match current {
            toml::Value::String(s) => s.clone(),
            toml::Value::Table(table) => toml::to_string_pretty(table)
                .map_err(|e| RedubError::Other(format!("Failed to serialize config: {}", e)))?,
            other => other.to_string(),
        })
    }

    /// The whole configuration as TOML.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RedubError::Other(format!("Failed to serialize config: {}", e)))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/redub/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("redub").join("config.toml"))
    }
}
