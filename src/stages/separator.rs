//! Vocal / background source separation.

use crate::audio::buffer::AudioBuffer;
use crate::audio::wav::write_wav;
use crate::defaults;
use crate::error::{RedubError, Result};
use crate::pipeline::stage::Stage;
use crate::stages::CallLog;
use crate::stages::command::{CommandExecutor, CommandTemplate, SystemCommandExecutor};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Paths of the separated stems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stems {
    pub vocals: PathBuf,
    /// Absent when the separator produced no accompaniment track.
    pub background: Option<PathBuf>,
}

/// Trait for splitting a mix into vocals and background.
pub trait Separator: Send + Sync {
    /// Separate `audio`, writing stems somewhere under `work_dir`.
    fn separate(&self, audio: &Path, work_dir: &Path) -> Result<Stems>;

    fn name(&self) -> &str;
}

/// Demucs two-stem separation, run out of process.
///
/// Demucs writes `<out>/<model>/<track>/vocals.wav` and `no_vocals.wav`. The model
/// directory name differs between releases, so known names are probed in order.
#[derive(Debug, Clone)]
pub struct DemucsSeparator<E: CommandExecutor = SystemCommandExecutor> {
    template: CommandTemplate,
    model_dirs: Vec<String>,
    executor: E,
}

impl DemucsSeparator<SystemCommandExecutor> {
    pub fn system(template: CommandTemplate, extra_model_dirs: &[String]) -> Self {
        Self::new(template, extra_model_dirs, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> DemucsSeparator<E> {
    pub fn new(template: CommandTemplate, extra_model_dirs: &[String], executor: E) -> Self {
        let mut model_dirs: Vec<String> = defaults::SEPARATOR_MODEL_DIRS
            .iter()
            .map(|s| s.to_string())
            .collect();
        for dir in extra_model_dirs {
            if !model_dirs.contains(dir) {
                model_dirs.push(dir.clone());
            }
        }
        Self {
            template,
            model_dirs,
            executor,
        }
    }

    /// Default command line: `demucs --two-stems vocals -o {out_dir} {audio}`.
    pub fn default_template() -> CommandTemplate {
        CommandTemplate::new("demucs", &["--two-stems", "vocals", "-o", "{out_dir}", "{audio}"])
    }

    pub fn model_dirs(&self) -> &[String] {
        &self.model_dirs
    }
}

impl<E: CommandExecutor> Separator for DemucsSeparator<E> {
    fn separate(&self, audio: &Path, work_dir: &Path) -> Result<Stems> {
        if !audio.exists() {
            return Err(RedubError::stage(
                Stage::Separate,
                format!("audio file not found: {}", audio.display()),
            ));
        }

        let out_dir = work_dir.join("separated");
        std::fs::create_dir_all(&out_dir)?;

        info!("Separating vocals from {}", audio.display());
        let audio_arg = audio.to_string_lossy();
        let out_arg = out_dir.to_string_lossy();
        self.template
            .run(&self.executor, &[("audio", audio_arg.as_ref()), ("out_dir", out_arg.as_ref())])?;

        resolve_stems(&out_dir, audio, &self.model_dirs).ok_or_else(|| {
            RedubError::stage(
                Stage::Separate,
                format!(
                    "no vocal stem found under {} (probed: {})",
                    out_dir.display(),
                    self.model_dirs.join(", ")
                ),
            )
        })
    }

    fn name(&self) -> &str {
        "demucs"
    }
}

/// Find the stems for `audio` under `out_dir`, trying each model directory in order.
pub fn resolve_stems(out_dir: &Path, audio: &Path, model_dirs: &[String]) -> Option<Stems> {
    let track = audio.file_stem()?;
    for model in model_dirs {
        let stem_dir = out_dir.join(model).join(track);
        let vocals = stem_dir.join("vocals.wav");
        if !vocals.is_file() {
            debug!("No stems under {}", stem_dir.display());
            continue;
        }
        let background = stem_dir.join("no_vocals.wav");
        let background = if background.is_file() {
            Some(background)
        } else {
            warn!("Separator produced vocals but no background in {}", stem_dir.display());
            None
        };
        return Some(Stems { vocals, background });
    }
    None
}

/// Mock separator for testing: writes fixed buffers as the stems.
#[derive(Debug, Clone)]
pub struct MockSeparator {
    vocals: AudioBuffer,
    background: Option<AudioBuffer>,
    should_fail: bool,
    calls: CallLog,
}

impl MockSeparator {
    pub fn new(vocals: AudioBuffer, background: Option<AudioBuffer>) -> Self {
        Self {
            vocals,
            background,
            should_fail: false,
            calls: CallLog::default(),
        }
    }

    /// Configure the mock to fail on separate
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }
}

impl Separator for MockSeparator {
    fn separate(&self, audio: &Path, work_dir: &Path) -> Result<Stems> {
        self.calls.record(format!("separate {}", audio.display()));
        if self.should_fail {
            return Err(RedubError::stage(Stage::Separate, "mock separation failure"));
        }

        let vocals = work_dir.join("vocals.wav");
        write_wav(&vocals, &self.vocals)?;
        let background = match &self.background {
            Some(buffer) => {
                let path = work_dir.join("no_vocals.wav");
                write_wav(&path, buffer)?;
                Some(path)
            }
            None => None,
        };
        Ok(Stems { vocals, background })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
