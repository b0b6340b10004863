//! Composition root: turn configuration into a ready orchestrator and run a batch.

use crate::batch::{BatchOptions, BatchSummary, run_batch};
use crate::config::{Config, TranscriptionBackend};
use crate::error::{RedubError, Result};
use crate::pipeline::orchestrator::{Capabilities, PipelineConfig, PipelineOrchestrator};
use crate::stages::command::CommandTemplate;
use crate::stages::denoiser::{DeepFilterDenoiser, Denoiser};
use crate::stages::separator::DemucsSeparator;
use crate::stages::synthesizer::CommandSynthesizer;
use crate::stages::transcriber::{CommandTranscriber, Transcriber};
use crate::stages::translator::Translator;
use crate::stages::whisper::{WhisperConfig, WhisperTranscriber};
use crate::state::manifest::JobStateStore;
use std::path::PathBuf;
use tracing::info;

/// Per-run overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub target_language: Option<String>,
    pub limit: Option<usize>,
    pub debug: bool,
    pub no_denoise: bool,
}

impl RunOverrides {
    /// Fold the overrides into `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(language) = &self.target_language {
            config.batch.target_language = language.clone();
        }
        if self.limit.is_some() {
            config.batch.limit = self.limit;
        }
        if self.debug {
            config.batch.debug = true;
        }
        if self.no_denoise {
            config.denoise.enabled = false;
        }
    }
}

fn create_transcriber(config: &Config) -> Result<Box<dyn Transcriber>> {
    let stt = &config.transcription;
    Ok(match stt.backend {
        TranscriptionBackend::Command => Box::new(CommandTranscriber::system(
            CommandTemplate::from_argv(&stt.command)?,
            &stt.model,
            &stt.language,
        )),
        TranscriptionBackend::Whisper => Box::new(WhisperTranscriber::new(WhisperConfig {
            model_path: stt.whisper_model.clone(),
            language: stt.language.clone(),
            threads: stt.threads,
        })?),
    })
}

#[cfg(feature = "ollama")]
fn create_translator(config: &Config) -> Result<Box<dyn Translator>> {
    use crate::stages::ollama::{OllamaConfig, OllamaTranslator};

    let translation = &config.translation;
    Ok(Box::new(OllamaTranslator::new(OllamaConfig {
        url: translation.ollama_url.clone(),
        model: translation.model.clone(),
        temperature: translation.temperature,
        timeout: std::time::Duration::from_secs(translation.timeout_secs),
    })?))
}

#[cfg(not(feature = "ollama"))]
fn create_translator(_config: &Config) -> Result<Box<dyn Translator>> {
    Err(RedubError::ConfigInvalidValue {
        key: "translation".to_string(),
        message: "built without the `ollama` feature; rebuild with --features ollama".to_string(),
    })
}

/// Build the real stage adapters described by `config`.
pub fn build_capabilities(config: &Config) -> Result<Capabilities> {
    let denoiser: Option<Box<dyn Denoiser>> = if config.denoise.enabled {
        Some(Box::new(DeepFilterDenoiser::system(CommandTemplate::from_argv(
            &config.denoise.command,
        )?)))
    } else {
        None
    };

    Ok(Capabilities {
        separator: Box::new(DemucsSeparator::system(
            CommandTemplate::from_argv(&config.separation.command)?,
            &config.separation.model_dirs,
        )),
        denoiser,
        transcriber: create_transcriber(config)?,
        translator: create_translator(config)?,
        synthesizer: Box::new(CommandSynthesizer::system(CommandTemplate::from_argv(
            &config.synthesis.command,
        )?)),
    })
}

/// Orchestrator settings for a run writing into `output_dir`.
pub fn pipeline_config(config: &Config, output_dir: PathBuf) -> PipelineConfig {
    PipelineConfig {
        target_language: config.batch.target_language.clone(),
        debug: config.batch.debug,
        scratch_dir: config.batch.scratch_dir.clone(),
        denoise_target: config.denoise.target,
        degraded_policy: config.translation.degraded_policy,
        use_reference_text: config.synthesis.use_reference_text,
        ..PipelineConfig::new(output_dir)
    }
}

/// Run `redub run`: validate, wire up the stages and process the input directory.
pub fn run_batch_command(
    mut config: Config,
    input_dir: PathBuf,
    output_dir: PathBuf,
    overrides: &RunOverrides,
) -> Result<BatchSummary> {
    overrides.apply(&mut config);
    config.validate()?;
    if !input_dir.is_dir() {
        return Err(RedubError::InputDirNotFound {
            path: input_dir.display().to_string(),
        });
    }
    std::fs::create_dir_all(&output_dir)?;

    let capabilities = build_capabilities(&config)?;
    info!("Stages: {:?}", capabilities);
    let store = JobStateStore::new(&output_dir);
    let mut orchestrator =
        PipelineOrchestrator::new(capabilities, pipeline_config(&config, output_dir), store);

    let options = BatchOptions {
        input_dir,
        limit: config.batch.limit,
        extensions: config
            .batch
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect(),
    };
    run_batch(&mut orchestrator, &options)
}
