//! Batch runs over a directory tree with mock stages.

use redub::audio::{AudioBuffer, write_wav};
use redub::batch::{BatchOptions, BatchSummary, run_batch};
use redub::error::{RedubError, Result};
use redub::pipeline::{Capabilities, PipelineConfig, PipelineOrchestrator, Stage};
use redub::stages::{
    CallLog, MockSeparator, MockSynthesizer, MockTranscriber, MockTranslator, Separator, Stems,
};
use redub::state::{JobStateStore, JobStatus};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RATE: u32 = 16000;

/// Separator that refuses files whose name contains "bad".
struct PickySeparator {
    inner: MockSeparator,
}

impl Separator for PickySeparator {
    fn separate(&self, audio: &Path, work_dir: &Path) -> Result<Stems> {
        if audio.to_string_lossy().contains("bad") {
            return Err(RedubError::stage(Stage::Separate, "unreadable"));
        }
        self.inner.separate(audio, work_dir)
    }

    fn name(&self) -> &str {
        "picky"
    }
}

fn voice(seconds: f32) -> AudioBuffer {
    AudioBuffer::mono(vec![0.25; (seconds * RATE as f32) as usize], RATE)
}

struct Library {
    dir: TempDir,
    log: CallLog,
}

impl Library {
    fn new(files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        for name in files {
            let path = dir.path().join("voice").join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            if name.ends_with(".wav") {
                write_wav(&path, &voice(0.5)).unwrap();
            } else {
                std::fs::write(&path, b"not decoded by the mocks").unwrap();
            }
        }
        std::fs::create_dir_all(dir.path().join("scratch")).unwrap();
        Self {
            dir,
            log: CallLog::default(),
        }
    }

    fn input_dir(&self) -> PathBuf {
        self.dir.path().join("voice")
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("dubbed")
    }

    fn orchestrator(&self) -> PipelineOrchestrator {
        let separator = MockSeparator::new(voice(0.5), Some(voice(1.0)));
        let capabilities = Capabilities {
            separator: Box::new(PickySeparator {
                inner: separator.with_call_log(self.log.clone()),
            }),
            denoiser: None,
            transcriber: Box::new(MockTranscriber::default().with_response("Stay a while and listen.")),
            translator: Box::new(MockTranslator::new()),
            synthesizer: Box::new(MockSynthesizer::new(voice(0.75))),
        };
        let config = PipelineConfig {
            scratch_dir: Some(self.dir.path().join("scratch")),
            ..PipelineConfig::new(self.output_dir())
        };
        let store = JobStateStore::with_root(&self.output_dir(), &self.input_dir());
        PipelineOrchestrator::new(capabilities, config, store)
    }

    fn run(&self, limit: Option<usize>) -> BatchSummary {
        let options = BatchOptions {
            limit,
            ..BatchOptions::new(self.input_dir())
        };
        run_batch(&mut self.orchestrator(), &options).unwrap()
    }
}

#[test]
fn processes_the_whole_tree_into_a_mirrored_layout() {
    let lib = Library::new(&["a.wav", "act1/b.mp3", "act1/scene2/c.FLAC", "notes.txt"]);
    let summary = lib.run(None);

    assert_eq!(
        summary,
        BatchSummary {
            discovered: 3,
            skipped: 0,
            completed: 3,
            failed: 0,
        }
    );
    let out = lib.output_dir();
    assert!(out.join("a.wav").is_file());
    assert!(out.join("act1/b.mp3.wav").is_file());
    assert!(out.join("act1/scene2/c.FLAC.wav").is_file());
    assert!(out.join("manifest.json").is_file());
    assert!(!out.join("notes.wav").exists());
}

#[test]
fn inputs_differing_only_by_extension_keep_their_own_dub() {
    let lib = Library::new(&["line.mp3", "line.wav"]);
    let summary = lib.run(None);
    assert_eq!(summary.completed, 2);

    let mut artifacts: Vec<String> = std::fs::read_dir(lib.output_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".wav"))
        .collect();
    artifacts.sort();
    assert_eq!(artifacts, vec!["line.mp3.wav", "line.wav"]);
}

#[test]
fn files_are_processed_in_sorted_order() {
    let lib = Library::new(&["b.wav", "a.wav", "c/a.wav"]);
    lib.run(None);

    let order: Vec<String> = lib
        .log
        .entries()
        .iter()
        .map(|c| {
            let path = c.trim_start_matches("separate ");
            Path::new(path)
                .strip_prefix(lib.input_dir())
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    assert_eq!(order, vec!["a.wav", "b.wav", "c/a.wav"]);
}

#[test]
fn one_bad_file_does_not_stop_the_batch() {
    let lib = Library::new(&["1.wav", "2_bad.wav", "3.wav"]);
    let summary = lib.run(None);

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert!(lib.output_dir().join("3.wav").is_file());
    assert!(!lib.output_dir().join("2_bad.wav").exists());

    let store = JobStateStore::with_root(&lib.output_dir(), &lib.input_dir());
    let entry = store.entry(&lib.input_dir().join("2_bad.wav")).unwrap();
    assert_eq!(entry.status, JobStatus::Failed);
    assert_eq!(entry.error.as_deref(), Some("separate: unreadable"));
}

#[test]
fn rerun_skips_completed_and_retries_failed() {
    let lib = Library::new(&["1.wav", "2_bad.wav"]);
    lib.run(None);
    let calls_after_first = lib.log.entries().len();

    let summary = lib.run(None);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 0);
    // the retried file fails again before reaching the logged separator
    assert_eq!(lib.log.entries().len(), calls_after_first);
}

#[test]
fn limit_counts_processed_files_only() {
    let lib = Library::new(&["1.wav", "2.wav", "3.wav", "4.wav"]);
    let first = lib.run(Some(2));
    assert_eq!(first.completed, 2);
    assert!(!lib.output_dir().join("3.wav").exists());

    // the two completed files are skipped without using up the limit
    let second = lib.run(Some(2));
    assert_eq!(second.skipped, 2);
    assert_eq!(second.completed, 2);
    assert!(lib.output_dir().join("4.wav").is_file());
}

#[test]
fn limit_zero_processes_nothing() {
    let lib = Library::new(&["1.wav"]);
    let summary = lib.run(Some(0));
    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.processed(), 0);
    assert!(lib.log.is_empty());
}

#[test]
fn failures_count_toward_the_limit() {
    let lib = Library::new(&["1_bad.wav", "2.wav", "3.wav"]);
    let summary = lib.run(Some(2));
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.completed, 1);
    assert!(!lib.output_dir().join("3.wav").exists());
}

#[test]
fn empty_input_dir_is_not_an_error() {
    let lib = Library::new(&[]);
    std::fs::create_dir_all(lib.input_dir()).unwrap();
    assert_eq!(lib.run(None), BatchSummary::default());
}

#[test]
fn missing_input_dir_is_an_error() {
    let lib = Library::new(&[]);
    let result = run_batch(&mut lib.orchestrator(), &BatchOptions::new(lib.input_dir()));
    assert!(matches!(result, Err(RedubError::InputDirNotFound { .. })));
}

#[test]
fn output_dir_inside_input_dir_is_not_rescanned() {
    let lib = Library::new(&["line.wav"]);
    let options = BatchOptions::new(lib.input_dir());
    let capabilities = Capabilities {
        separator: Box::new(MockSeparator::new(voice(0.5), None).with_call_log(lib.log.clone())),
        denoiser: None,
        transcriber: Box::new(MockTranscriber::default()),
        translator: Box::new(MockTranslator::new()),
        synthesizer: Box::new(MockSynthesizer::new(voice(0.5))),
    };
    let output_dir = lib.input_dir().join("out");
    let store = JobStateStore::with_root(&output_dir, &lib.input_dir());
    let mut orchestrator =
        PipelineOrchestrator::new(capabilities, PipelineConfig::new(&output_dir), store);

    run_batch(&mut orchestrator, &options).unwrap();
    let second = run_batch(&mut orchestrator, &options).unwrap();

    assert_eq!(second.discovered, 1);
    assert_eq!(second.skipped, 1);
}
