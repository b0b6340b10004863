use crate::error::{RedubError, Result};
use crate::pipeline::stage::Stage;
use crate::stages::CallLog;
use crate::stages::command::{CommandExecutor, CommandTemplate, SystemCommandExecutor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One timed piece of transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: &str) -> Self {
        Self {
            start,
            end,
            text: text.to_string(),
        }
    }
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (external tool, Whisper, mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into ordered segments (possibly none).
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>>;

    /// Get the name of the model in use
    fn model_name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> to allow sharing.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>> {
        (**self).transcribe(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Space-join trimmed segment texts in order, skipping empty ones.
pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Transcription through an external tool.
///
/// The tool may print segments as JSON on stdout, or write a JSON file to
/// `{out_dir}/<audio stem>.json` (the layout of the `whisper` CLI). Accepted shapes:
/// a bare `[{start, end, text}]` array, an object with a `segments` array of the same,
/// or whisper.cpp's `transcription` array with millisecond `offsets`.
#[derive(Debug, Clone)]
pub struct CommandTranscriber<E: CommandExecutor = SystemCommandExecutor> {
    template: CommandTemplate,
    language: String,
    model: String,
    executor: E,
}

impl CommandTranscriber<SystemCommandExecutor> {
    pub fn system(template: CommandTemplate, model: &str, language: &str) -> Self {
        Self::new(template, model, language, SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> CommandTranscriber<E> {
    pub fn new(template: CommandTemplate, model: &str, language: &str, executor: E) -> Self {
        Self {
            template,
            language: language.to_string(),
            model: model.to_string(),
            executor,
        }
    }

    /// Default command line for the `whisper` CLI.
    pub fn default_template() -> CommandTemplate {
        CommandTemplate::new(
            "whisper",
            &[
                "{audio}",
                "--model",
                "{model}",
                "--language",
                "{language}",
                "--output_format",
                "json",
                "--output_dir",
                "{out_dir}",
            ],
        )
    }
}

impl<E: CommandExecutor> Transcriber for CommandTranscriber<E> {
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>> {
        let out_dir = audio
            .parent()
            .map(|p| p.join("transcript"))
            .unwrap_or_else(|| Path::new("transcript").to_path_buf());
        std::fs::create_dir_all(&out_dir)?;

        info!("Transcribing {} with {}", audio.display(), self.template.program());
        let audio_arg = audio.to_string_lossy();
        let out_arg = out_dir.to_string_lossy();
        let stdout = self.template.run(
            &self.executor,
            &[
                ("audio", audio_arg.as_ref()),
                ("out_dir", out_arg.as_ref()),
                ("language", self.language.as_str()),
                ("model", self.model.as_str()),
            ],
        )?;

        if let Some(segments) = parse_segments(stdout.trim()) {
            return Ok(segments);
        }

        let stem = audio.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let json_path = out_dir.join(format!("{}.json", stem));
        debug!("No segments on stdout, reading {}", json_path.display());
        let content = std::fs::read_to_string(&json_path).map_err(|e| {
            RedubError::stage(
                Stage::Transcribe,
                format!("no transcript on stdout or at {}: {}", json_path.display(), e),
            )
        })?;
        parse_segments(&content).ok_or_else(|| {
            RedubError::stage(
                Stage::Transcribe,
                format!("unrecognized transcript format in {}", json_path.display()),
            )
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Deserialize)]
struct SegmentsDocument {
    segments: Vec<Segment>,
}

#[derive(Deserialize)]
struct WhisperCppDocument {
    transcription: Vec<WhisperCppSegment>,
}

#[derive(Deserialize)]
struct WhisperCppSegment {
    offsets: WhisperCppOffsets,
    text: String,
}

#[derive(Deserialize)]
struct WhisperCppOffsets {
    from: u64,
    to: u64,
}

/// Parse any of the accepted transcript JSON shapes. `None` if it is none of them.
pub fn parse_segments(json: &str) -> Option<Vec<Segment>> {
    if json.is_empty() {
        return None;
    }
    if let Ok(segments) = serde_json::from_str::<Vec<Segment>>(json) {
        return Some(segments);
    }
    if let Ok(doc) = serde_json::from_str::<SegmentsDocument>(json) {
        return Some(doc.segments);
    }
    if let Ok(doc) = serde_json::from_str::<WhisperCppDocument>(json) {
        return Some(
            doc.transcription
                .into_iter()
                .map(|s| Segment {
                    start: s.offsets.from as f64 / 1000.0,
                    end: s.offsets.to as f64 / 1000.0,
                    text: s.text,
                })
                .collect(),
        );
    }
    None
}

/// Mock transcriber for testing
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    segments: Vec<Segment>,
    should_fail: bool,
    calls: CallLog,
}

impl MockTranscriber {
    /// Create a new mock transcriber returning one default segment
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            segments: vec![Segment::new(0.0, 1.0, "mock transcription")],
            should_fail: false,
            calls: CallLog::default(),
        }
    }

    /// Configure the mock to return a single segment with this text
    pub fn with_response(mut self, response: &str) -> Self {
        self.segments = vec![Segment::new(0.0, 1.0, response)];
        self
    }

    /// Configure the mock to return these segments
    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>> {
        self.calls.record(format!("transcribe {}", audio.display()));
        if self.should_fail {
            Err(RedubError::stage(Stage::Transcribe, "mock transcription failure"))
        } else {
            Ok(self.segments.clone())
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::command::MockCommandExecutor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_join_segments_trims_and_skips_empty() {
        let segments = vec![
            Segment::new(0.0, 1.0, " Hello "),
            Segment::new(1.0, 1.5, "   "),
            Segment::new(1.5, 2.0, "world."),
        ];
        assert_eq!(join_segments(&segments), "Hello world.");
    }

    #[test]
    fn test_join_segments_empty() {
        assert_eq!(join_segments(&[]), "");
    }

    #[test]
    fn test_parse_plain_array() {
        let json = r#"[{"start": 0.0, "end": 1.2, "text": "Stay alert"}]"#;
        assert_eq!(parse_segments(json).unwrap(), vec![Segment::new(0.0, 1.2, "Stay alert")]);
    }

    #[test]
    fn test_parse_whisper_cli_document() {
        let json = r#"{"text": "a b", "language": "en", "segments": [
            {"id": 0, "start": 0.0, "end": 0.5, "text": " a", "tokens": [1]},
            {"id": 1, "start": 0.5, "end": 1.0, "text": " b", "tokens": [2]}
        ]}"#;
        let segments = parse_segments(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start, 0.5);
    }

    #[test]
    fn test_parse_whisper_cpp_document() {
        let json = r#"{"transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:01,500"},
             "offsets": {"from": 0, "to": 1500}, "text": " hi"}
        ]}"#;
        let segments = parse_segments(json).unwrap();
        assert_eq!(segments[0].end, 1.5);
        assert_eq!(segments[0].text, " hi");
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse_segments("").is_none());
        assert!(parse_segments("progress: 50%").is_none());
        assert!(parse_segments(r#"{"other": 1}"#).is_none());
    }

    #[test]
    fn test_command_transcriber_reads_stdout() {
        let dir = TempDir::new().unwrap();
        let executor = MockCommandExecutor::with_handler(|_, _| {
            Ok(r#"[{"start": 0.0, "end": 1.0, "text": "from stdout"}]"#.to_string())
        });
        let transcriber = CommandTranscriber::new(
            CommandTranscriber::<MockCommandExecutor>::default_template(),
            "large-v3-turbo",
            "en",
            executor,
        );

        let segments = transcriber.transcribe(&dir.path().join("vocals.wav")).unwrap();
        assert_eq!(join_segments(&segments), "from stdout");

        let args = &transcriber.executor.calls()[0].1;
        assert!(args.contains(&"large-v3-turbo".to_string()));
        assert!(args.contains(&"en".to_string()));
    }

    #[test]
    fn test_command_transcriber_reads_output_file() {
        let dir = TempDir::new().unwrap();
        let executor = MockCommandExecutor::with_handler(|_, args| {
            let out_dir = PathBuf::from(&args[8]);
            std::fs::write(
                out_dir.join("vocals.json"),
                r#"{"segments": [{"start": 0.0, "end": 2.0, "text": "from file"}]}"#,
            )
            .unwrap();
            Ok("Detected language: English".to_string())
        });
        let transcriber = CommandTranscriber::new(
            CommandTranscriber::<MockCommandExecutor>::default_template(),
            "base",
            "en",
            executor,
        );

        let segments = transcriber.transcribe(&dir.path().join("vocals.wav")).unwrap();
        assert_eq!(segments[0].text, "from file");
    }

    #[test]
    fn test_command_transcriber_without_transcript_fails() {
        let dir = TempDir::new().unwrap();
        let transcriber = CommandTranscriber::new(
            CommandTranscriber::<MockCommandExecutor>::default_template(),
            "base",
            "en",
            MockCommandExecutor::new(),
        );
        match transcriber.transcribe(&dir.path().join("vocals.wav")) {
            Err(RedubError::StageFailed { stage, .. }) => assert_eq!(stage, Stage::Transcribe),
            other => panic!("Expected StageFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new("test-model").with_response("Hello, this is a test");
        let segments = transcriber.transcribe(Path::new("a.wav")).unwrap();
        assert_eq!(join_segments(&segments), "Hello, this is a test");
    }

    #[test]
    fn test_mock_transcriber_returns_error_when_configured() {
        let transcriber = MockTranscriber::new("test-model").with_failure();
        assert!(matches!(
            transcriber.transcribe(Path::new("a.wav")),
            Err(RedubError::StageFailed { stage: Stage::Transcribe, .. })
        ));
    }

    #[test]
    fn test_transcriber_trait_is_object_safe() {
        let transcriber: Box<dyn Transcriber> =
            Box::new(MockTranscriber::new("test-model").with_segments(vec![]));
        assert_eq!(transcriber.model_name(), "test-model");
        assert!(transcriber.transcribe(Path::new("a.wav")).unwrap().is_empty());
    }
}
