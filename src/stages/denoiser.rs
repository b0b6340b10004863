//! Best-effort noise suppression.

use crate::audio::wav::{read_wav, write_wav};
use crate::defaults;
use crate::stages::CallLog;
use crate::stages::command::{CommandExecutor, CommandTemplate, SystemCommandExecutor};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Trait for cleaning up noisy audio.
///
/// Denoising is optional: implementations report problems by returning `None`, and
/// callers carry on with the original audio.
pub trait Denoiser: Send + Sync {
    /// Clean `audio` into `out`. Returns the cleaned file, or `None` if unavailable.
    fn denoise(&self, audio: &Path, out: &Path) -> Option<PathBuf>;

    fn name(&self) -> &str;
}

/// DeepFilterNet, run out of process.
///
/// `deepFilter` writes `<out_dir>/<stem>_DeepFilterNet3.wav`; that file is renamed to
/// the requested output path.
#[derive(Debug, Clone)]
pub struct DeepFilterDenoiser<E: CommandExecutor = SystemCommandExecutor> {
    template: CommandTemplate,
    executor: E,
}

impl DeepFilterDenoiser<SystemCommandExecutor> {
    pub fn system(template: CommandTemplate) -> Self {
        Self::new(template, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> DeepFilterDenoiser<E> {
    pub fn new(template: CommandTemplate, executor: E) -> Self {
        Self { template, executor }
    }

    /// Default command line: `deepFilter -m DeepFilterNet3 {audio} -o {out_dir}`.
    pub fn default_template() -> CommandTemplate {
        CommandTemplate::new("deepFilter", &["-m", "DeepFilterNet3", "{audio}", "-o", "{out_dir}"])
    }
}

impl<E: CommandExecutor> Denoiser for DeepFilterDenoiser<E> {
    fn denoise(&self, audio: &Path, out: &Path) -> Option<PathBuf> {
        if !audio.is_file() {
            warn!("Cannot denoise missing file {}", audio.display());
            return None;
        }
        let out_dir = match out.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if let Err(e) = std::fs::create_dir_all(&out_dir) {
            warn!("Cannot create denoise output dir {}: {}", out_dir.display(), e);
            return None;
        }

        info!("Denoising {}", audio.display());
        let audio_arg = audio.to_string_lossy();
        let out_dir_arg = out_dir.to_string_lossy();
        let out_arg = out.to_string_lossy();
        let vars = [
            ("audio", audio_arg.as_ref()),
            ("out_dir", out_dir_arg.as_ref()),
            ("output", out_arg.as_ref()),
        ];
        if let Err(e) = self.template.run(&self.executor, &vars) {
            warn!("Denoiser unavailable, continuing without it: {}", e);
            return None;
        }

        if out.is_file() {
            return Some(out.to_path_buf());
        }
        let stem = audio.file_stem()?.to_string_lossy();
        let produced = out_dir.join(format!("{}{}.wav", stem, defaults::DEEPFILTER_SUFFIX));
        if produced.is_file() {
            return match std::fs::rename(&produced, out) {
                Ok(()) => Some(out.to_path_buf()),
                Err(e) => {
                    warn!("Failed to move {} into place: {}", produced.display(), e);
                    None
                }
            };
        }

        warn!("Denoiser finished but produced no output for {}", audio.display());
        None
    }

    fn name(&self) -> &str {
        "deepfilternet"
    }
}

/// Mock denoiser for testing.
///
/// By default copies the input through a WAV decode/encode, which is enough to prove
/// the cleaned path is what downstream stages receive.
#[derive(Debug, Clone, Default)]
pub struct MockDenoiser {
    unavailable: bool,
    panics: bool,
    calls: CallLog,
}

impl MockDenoiser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to return `None`
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Configure the mock to panic mid-call
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }
}

impl Denoiser for MockDenoiser {
    fn denoise(&self, audio: &Path, out: &Path) -> Option<PathBuf> {
        self.calls.record(format!("denoise {}", audio.display()));
        if self.panics {
            panic!("mock denoiser crashed");
        }
        if self.unavailable {
            return None;
        }
        let buffer = read_wav(audio).ok()?;
        write_wav(out, &buffer).ok()?;
        Some(out.to_path_buf())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
