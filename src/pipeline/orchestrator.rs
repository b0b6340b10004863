//! Per-file redub flow.
//!
//! One call to [`PipelineOrchestrator::process`] takes a file through
//! denoise (optional) → separate → transcribe → translate → synthesize → mix/copy,
//! inside a private scratch workspace that is removed however the call ends. Stage
//! failures are recorded in the manifest and never stop the batch; only failing to
//! create a workspace is returned as an error.

use crate::audio::synchronizer::{AudioSynchronizer, SyncConfig};
use crate::audio::wav::wav_duration_secs;
use crate::defaults;
use crate::error::{RedubError, Result};
use crate::pipeline::stage::Stage;
use crate::pipeline::workspace::ProcessingWorkspace;
use crate::stages::denoiser::Denoiser;
use crate::stages::separator::Separator;
use crate::stages::synthesizer::{SynthesisRequest, Synthesizer};
use crate::stages::transcriber::{Transcriber, join_segments};
use crate::stages::translator::{TranslationOutcome, Translator, synthesis_language};
use crate::state::manifest::{CompletionMetadata, JobStateStore};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::ffi::{OsStr, OsString};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Which audio the denoiser cleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DenoiseTarget {
    /// The input file, before separation.
    Input,
    /// The separated vocal stem.
    #[default]
    Vocals,
}

/// What to do when the translator falls back to the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradedTranslationPolicy {
    /// Log a warning and synthesize the untranslated text.
    #[default]
    Proceed,
    /// Fail the file at the translate stage.
    Fail,
}

/// The model-backed collaborators, injected by the caller.
pub struct Capabilities {
    pub separator: Box<dyn Separator>,
    /// `None` disables denoising.
    pub denoiser: Option<Box<dyn Denoiser>>,
    pub transcriber: Box<dyn Transcriber>,
    pub translator: Box<dyn Translator>,
    pub synthesizer: Box<dyn Synthesizer>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("separator", &self.separator.name())
            .field("denoiser", &self.denoiser.as_ref().map(|d| d.name()))
            .field("transcriber", &self.transcriber.model_name())
            .field("translator", &self.translator.name())
            .field("synthesizer", &self.synthesizer.name())
            .finish()
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where final artifacts, the manifest and debug mirrors go
    pub output_dir: PathBuf,
    /// Target-language label handed to the translator
    pub target_language: String,
    /// Mirror each workspace under `<output_dir>/debug/` before removing it
    pub debug: bool,
    /// Parent directory for workspaces (system temp dir when `None`)
    pub scratch_dir: Option<PathBuf>,
    pub denoise_target: DenoiseTarget,
    pub degraded_policy: DegradedTranslationPolicy,
    /// Pass the original transcript to the synthesizer as the reference text
    pub use_reference_text: bool,
    pub sync: SyncConfig,
}

impl PipelineConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            debug: false,
            scratch_dir: None,
            denoise_target: DenoiseTarget::default(),
            degraded_policy: DegradedTranslationPolicy::default(),
            use_reference_text: true,
            sync: SyncConfig::default(),
        }
    }
}

/// Result of processing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Already completed in an earlier run; nothing was touched.
    Skipped,
    Completed {
        output: PathBuf,
        original_text: String,
        translated_text: String,
    },
    /// Recorded in the manifest as `"<stage>: <message>"`.
    Failed { stage: Stage, message: String },
}

#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    message: String,
}

impl StageFailure {
    fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    fn from_error(stage: Stage, err: RedubError) -> Self {
        match err {
            RedubError::StageFailed { message, .. } => Self::new(stage, message),
            other => Self::new(stage, other.to_string()),
        }
    }
}

struct Finished {
    original_text: String,
    translated_text: String,
}

type StageResult<T> = std::result::Result<T, StageFailure>;

/// Drives files through the redub stages and records the outcome.
pub struct PipelineOrchestrator {
    capabilities: Capabilities,
    config: PipelineConfig,
    store: JobStateStore,
    synchronizer: AudioSynchronizer,
}

impl PipelineOrchestrator {
    pub fn new(capabilities: Capabilities, config: PipelineConfig, store: JobStateStore) -> Self {
        let synchronizer = AudioSynchronizer::new(config.sync.clone());
        Self {
            capabilities,
            config,
            store,
            synchronizer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &JobStateStore {
        &self.store
    }

    pub fn into_store(self) -> JobStateStore {
        self.store
    }

    /// `<output_dir>/<dub file name>`, see [`dub_file_name`].
    pub fn final_path_for(&self, input: &Path) -> PathBuf {
        let name = input.file_name().unwrap_or(input.as_os_str());
        self.config.output_dir.join(dub_file_name(name))
    }

    /// `<output_dir>/debug/<final path relative to output_dir, minus .wav>`
    fn debug_dir_for(&self, final_path: &Path) -> PathBuf {
        let relative = final_path
            .strip_prefix(&self.config.output_dir)
            .ok()
            .filter(|r| !r.as_os_str().is_empty())
            .or_else(|| final_path.file_name().map(Path::new))
            .unwrap_or_else(|| Path::new("unnamed"));
        self.config
            .output_dir
            .join(defaults::DEBUG_DIR)
            .join(relative.with_extension(""))
    }

    /// Process `input` into [`final_path_for`](Self::final_path_for).
    pub fn process(&mut self, input: &Path) -> Result<FileOutcome> {
        let final_path = self.final_path_for(input);
        self.process_to(input, &final_path)
    }

    /// Process `input`, writing the final artifact to `final_path`.
    ///
    /// # Errors
    /// Only `WorkspaceAcquisition`; every stage failure is reported as
    /// `FileOutcome::Failed` and recorded in the manifest.
    pub fn process_to(&mut self, input: &Path, final_path: &Path) -> Result<FileOutcome> {
        if self.store.is_processed(input) {
            info!("Skipping {} (already completed)", input.display());
            return Ok(FileOutcome::Skipped);
        }

        info!("Processing {}", input.display());
        let workspace = ProcessingWorkspace::acquire(self.config.scratch_dir.as_deref())?;
        let result = self.run_stages(input, final_path, &workspace);

        if self.config.debug {
            workspace.mirror_to(&self.debug_dir_for(final_path));
        }
        workspace.release();

        match result {
            Ok(finished) => {
                self.store.mark_completed(
                    input,
                    CompletionMetadata {
                        original_text: finished.original_text.clone(),
                        translated_text: finished.translated_text.clone(),
                    },
                );
                info!("Completed {} -> {}", input.display(), final_path.display());
                Ok(FileOutcome::Completed {
                    output: final_path.to_path_buf(),
                    original_text: finished.original_text,
                    translated_text: finished.translated_text,
                })
            }
            Err(failure) => {
                error!(
                    "Failed {} at {}: {}",
                    input.display(),
                    failure.stage,
                    failure.message
                );
                // a failed entry never has an artifact, including one left by an earlier run
                if final_path.is_file()
                    && let Err(e) = std::fs::remove_file(final_path)
                {
                    warn!("Failed to remove stale output {}: {}", final_path.display(), e);
                }
                self.store
                    .mark_failed(input, format!("{}: {}", failure.stage, failure.message));
                Ok(FileOutcome::Failed {
                    stage: failure.stage,
                    message: failure.message,
                })
            }
        }
    }

    fn run_stages(
        &self,
        input: &Path,
        final_path: &Path,
        workspace: &ProcessingWorkspace,
    ) -> StageResult<Finished> {
        let caps = &self.capabilities;

        let mut source = input.to_path_buf();
        if self.config.denoise_target == DenoiseTarget::Input
            && let Some(clean) = self.denoise(input, &workspace.file("input_denoised.wav"))
        {
            source = clean;
        }

        info!("[{}] {}", Stage::Separate, source.display());
        let stems = guarded(Stage::Separate, || caps.separator.separate(&source, workspace.path()))?;
        if !stems.vocals.is_file() {
            return Err(StageFailure::new(
                Stage::Separate,
                format!("vocal stem missing: {}", stems.vocals.display()),
            ));
        }

        let mut vocals = stems.vocals.clone();
        if self.config.denoise_target == DenoiseTarget::Vocals
            && let Some(clean) = self.denoise(&stems.vocals, &workspace.file("vocals_denoised.wav"))
        {
            vocals = clean;
        }

        info!("[{}] {}", Stage::Transcribe, vocals.display());
        let segments = guarded(Stage::Transcribe, || caps.transcriber.transcribe(&vocals))?;
        let original_text = join_segments(&segments);
        if original_text.is_empty() {
            return Err(StageFailure::new(Stage::Transcribe, "no speech recognized"));
        }
        debug!("Transcript: {}", original_text);

        let target_duration = match wav_duration_secs(&vocals) {
            Ok(secs) => Some(secs),
            Err(e) => {
                debug!("No duration hint for translation: {}", e);
                None
            }
        };
        info!("[{}] to {}", Stage::Translate, self.config.target_language);
        let translation = guarded(Stage::Translate, || {
            Ok(caps
                .translator
                .translate(&original_text, &self.config.target_language, target_duration))
        })?;
        if let TranslationOutcome::DegradedToOriginal { reason } = &translation.outcome {
            warn!("Translation degraded to the original text: {}", reason);
            if self.config.degraded_policy == DegradedTranslationPolicy::Fail {
                return Err(StageFailure::new(
                    Stage::Translate,
                    format!("translation unavailable: {}", reason),
                ));
            }
        }
        if translation.text.trim().is_empty() {
            return Err(StageFailure::new(Stage::Translate, "translation is empty"));
        }

        let language = synthesis_language(&translation, &self.config.target_language);
        let dub_path = workspace.file("dub.wav");
        let request = SynthesisRequest {
            text: &translation.text,
            ref_audio: &vocals,
            output: &dub_path,
            language: &language,
            ref_text: self.config.use_reference_text.then_some(original_text.as_str()),
            instruction: translation.tts_instruction.as_deref(),
        };
        info!("[{}] {} chars in {}", Stage::Synthesize, translation.text.chars().count(), language);
        let dub = guarded(Stage::Synthesize, || caps.synthesizer.synthesize(&request))?;
        if !dub.is_file() {
            return Err(StageFailure::new(
                Stage::Synthesize,
                format!("synthesized audio missing: {}", dub.display()),
            ));
        }

        guarded(Stage::Mix, || {
            if let Some(parent) = final_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match stems.background.as_deref().filter(|bg| bg.is_file()) {
                Some(background) => {
                    info!("[{}] with {}", Stage::Mix, background.display());
                    let report = self.synchronizer.mix_files(&dub, background, final_path)?;
                    debug!("Mix report: {:?}", report);
                }
                None => {
                    info!("[{}] no background, copying dub", Stage::Mix);
                    std::fs::copy(&dub, final_path)?;
                }
            }
            Ok(())
        })?;

        if !final_path.is_file() {
            return Err(StageFailure::new(
                Stage::Finalize,
                format!("final artifact missing: {}", final_path.display()),
            ));
        }

        Ok(Finished {
            original_text,
            translated_text: translation.text,
        })
    }

    /// Best-effort denoise; `None` means carry on with the original audio.
    fn denoise(&self, audio: &Path, out: &Path) -> Option<PathBuf> {
        let denoiser = self.capabilities.denoiser.as_ref()?;
        info!("[{}] {}", Stage::Denoise, audio.display());
        match catch_unwind(AssertUnwindSafe(|| denoiser.denoise(audio, out))) {
            Ok(Some(clean)) if clean.is_file() => Some(clean),
            Ok(Some(clean)) => {
                warn!("Denoiser reported {} but it does not exist", clean.display());
                None
            }
            Ok(None) => {
                warn!("Denoising unavailable, using {}", audio.display());
                None
            }
            Err(payload) => {
                warn!(
                    "Denoiser panicked ({}), using {}",
                    panic_message(payload.as_ref()),
                    audio.display()
                );
                None
            }
        }
    }
}

/// File name of the dub for an input file name.
///
/// A `.wav` input keeps its name. Anything else gets `.wav` appended to the whole
/// name (`line.mp3` -> `line.mp3.wav`), and so does a `.wav` whose stem still carries
/// an extension (`line.mp3.wav` -> `line.mp3.wav.wav`). Inputs that differ only by
/// extension therefore never share an output.
pub fn dub_file_name(name: &OsStr) -> OsString {
    let path = Path::new(name);
    let is_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    let stem_has_extension = path
        .file_stem()
        .is_some_and(|stem| Path::new(stem).extension().is_some());
    if is_wav && !stem_has_extension {
        return name.to_os_string();
    }
    let mut dubbed = name.to_os_string();
    dubbed.push(".wav");
    dubbed
}

/// Run one stage call, turning errors and panics into a tagged failure.
fn guarded<T>(stage: Stage, call: impl FnOnce() -> Result<T>) -> StageResult<T> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StageFailure::from_error(stage, e)),
        Err(payload) => Err(StageFailure::new(
            stage,
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
