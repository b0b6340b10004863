//! Voice-cloning speech synthesis.

use crate::audio::buffer::AudioBuffer;
use crate::audio::wav::write_wav;
use crate::error::{RedubError, Result};
use crate::pipeline::stage::Stage;
use crate::stages::CallLog;
use crate::stages::command::{CommandExecutor, CommandTemplate, SystemCommandExecutor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Everything a synthesizer needs for one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    /// Recording whose voice is cloned.
    pub ref_audio: &'a Path,
    pub output: &'a Path,
    pub language: &'a str,
    /// Transcript of `ref_audio`; improves cloning fidelity when known.
    pub ref_text: Option<&'a str>,
    /// Delivery/style hint from the translator.
    pub instruction: Option<&'a str>,
}

/// Trait for text-to-speech with voice cloning.
pub trait Synthesizer: Send + Sync {
    /// Write speech for `request.text` to `request.output` and return the path written.
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<PathBuf>;

    fn name(&self) -> &str;
}

impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<PathBuf> {
        (**self).synthesize(request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Synthesis through an external TTS command.
///
/// Placeholders: `{text}`, `{ref_audio}`, `{output}`, `{language}`, `{ref_text}` and
/// `{instruction}`. Absent optional values are substituted as empty strings. The call
/// succeeds when the command exits cleanly and the output file exists.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer<E: CommandExecutor = SystemCommandExecutor> {
    template: CommandTemplate,
    executor: E,
}

impl CommandSynthesizer<SystemCommandExecutor> {
    pub fn system(template: CommandTemplate) -> Self {
        Self::new(template, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> CommandSynthesizer<E> {
    pub fn new(template: CommandTemplate, executor: E) -> Self {
        Self { template, executor }
    }

    pub fn default_template() -> CommandTemplate {
        CommandTemplate::new(
            "qwen-tts",
            &[
                "--text",
                "{text}",
                "--language",
                "{language}",
                "--ref-audio",
                "{ref_audio}",
                "--ref-text",
                "{ref_text}",
                "--instruct",
                "{instruction}",
                "--output",
                "{output}",
            ],
        )
    }

    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }
}

impl<E: CommandExecutor> Synthesizer for CommandSynthesizer<E> {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<PathBuf> {
        if request.text.trim().is_empty() {
            return Err(RedubError::stage(Stage::Synthesize, "nothing to synthesize"));
        }
        if let Some(parent) = request.output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        info!(
            "Synthesizing {} chars of {} speech",
            request.text.chars().count(),
            request.language
        );
        let ref_audio = request.ref_audio.to_string_lossy();
        let output = request.output.to_string_lossy();
        let vars = [
            ("text", request.text),
            ("ref_audio", ref_audio.as_ref()),
            ("output", output.as_ref()),
            ("language", request.language),
            ("ref_text", request.ref_text.unwrap_or_default()),
            ("instruction", request.instruction.unwrap_or_default()),
        ];
        self.template.run(&self.executor, &vars)?;

        if request.output.is_file() {
            Ok(request.output.to_path_buf())
        } else {
            Err(RedubError::stage(
                Stage::Synthesize,
                format!(
                    "{} exited cleanly but wrote no audio to {}",
                    self.template.program(),
                    request.output.display()
                ),
            ))
        }
    }

    fn name(&self) -> &str {
        self.template.program()
    }
}

/// Mock synthesizer for testing: writes a fixed buffer as the dub.
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    speech: AudioBuffer,
    should_fail: bool,
    panics: bool,
    calls: CallLog,
}

impl MockSynthesizer {
    pub fn new(speech: AudioBuffer) -> Self {
        Self {
            speech,
            should_fail: false,
            panics: false,
            calls: CallLog::default(),
        }
    }

    /// Configure the mock to fail on synthesize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
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

impl Synthesizer for MockSynthesizer {
    fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<PathBuf> {
        self.calls.record(format!(
            "synthesize {} ref={} ref_text={} instruction={}",
            request.language,
            request.ref_audio.display(),
            request.ref_text.unwrap_or("-"),
            request.instruction.unwrap_or("-")
        ));
        if self.panics {
            panic!("mock synthesizer crashed");
        }
        if self.should_fail {
            return Err(RedubError::stage(Stage::Synthesize, "mock synthesis failure"));
        }
        write_wav(request.output, &self.speech)?;
        Ok(request.output.to_path_buf())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
