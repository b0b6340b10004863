//! Default configuration constants for redub.
//!
//! Shared by the config layer, the mixing engine and the stage adapters so the
//! numbers that shape the output live in one place.

/// Default target-language label handed to the translator.
pub const TARGET_LANGUAGE: &str = "Brazilian Portuguese";

/// Manifest file name inside the batch output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Directory (under the output directory) that receives debug workspace mirrors.
pub const DEBUG_DIR: &str = "debug";

/// Prefix for per-file scratch directories.
pub const WORKSPACE_PREFIX: &str = "redub-";

/// Audio file extensions picked up by the batch driver.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a"];

/// Gain applied to the dubbed voice in the final mix.
pub const FOREGROUND_GAIN: f32 = 1.0;

/// Gain applied to the background stem in the final mix.
///
/// Dialogue stays on top; ambience sits slightly below it.
pub const BACKGROUND_GAIN: f32 = 0.8;

/// Duration mismatch (ms) tolerated before stretching a longer foreground.
pub const SYNC_TOLERANCE_MS: f64 = 100.0;

/// Stretch ratios above this are applied but reported as likely to sound robotic.
pub const STRETCH_WARN_RATIO: f64 = 1.25;

/// Silence trimming threshold in dB below the loudest frame.
pub const TRIM_TOP_DB: f32 = 30.0;

/// Frame length (samples) used by the silence trimmer.
pub const TRIM_FRAME_LENGTH: usize = 2048;

/// Hop length (samples) used by the silence trimmer.
pub const TRIM_HOP_LENGTH: usize = 512;

/// Sample rate Whisper expects.
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama model used for translation.
pub const OLLAMA_MODEL: &str = "llama3.1";

/// Sampling temperature for translation requests.
pub const TRANSLATION_TEMPERATURE: f32 = 0.3;

/// HTTP timeout for a single translation request, in seconds.
pub const TRANSLATION_TIMEOUT_SECS: u64 = 30;

/// Separator model directory names probed, in order, after a separation run.
pub const SEPARATOR_MODEL_DIRS: &[&str] = &["htdemucs", "hdemucs"];

/// Suffix DeepFilterNet appends to cleaned files.
pub const DEEPFILTER_SUFFIX: &str = "_DeepFilterNet3";

/// Language spoken in the source audio, passed to the transcriber.
pub const SOURCE_LANGUAGE: &str = "en";

/// Language value that lets Whisper detect the spoken language.
pub const AUTO_LANGUAGE: &str = "auto";

/// Model name handed to the external transcription command.
pub const TRANSCRIPTION_MODEL: &str = "large-v3-turbo";
