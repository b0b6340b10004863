//! Batch driver: find audio files and push them through the orchestrator one by one.

use crate::defaults;
use crate::error::{RedubError, Result};
use crate::pipeline::orchestrator::{FileOutcome, PipelineOrchestrator, dub_file_name};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// What to process.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_dir: PathBuf,
    /// Maximum number of files to actually process; skipped files do not count.
    pub limit: Option<usize>,
    /// Lower-case extensions without the dot.
    pub extensions: Vec<String>,
}

impl BatchOptions {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            limit: None,
            extensions: defaults::AUDIO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub discovered: usize,
    pub skipped: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Audio files under `input_dir`, recursively, sorted by path.
///
/// Extensions match case-insensitively. Anything under `exclude` (the output
/// directory when it sits inside the input tree) is left out.
pub fn discover_audio_files(input_dir: &Path, extensions: &[String], exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(RedubError::InputDirNotFound {
            path: input_dir.display().to_string(),
        });
    }
    let excluded = exclude.and_then(|p| std::fs::canonicalize(p).ok());
    let is_excluded = |entry: &DirEntry| {
        entry.file_type().is_dir()
            && excluded
                .as_deref()
                .is_some_and(|ex| std::fs::canonicalize(entry.path()).is_ok_and(|p| p == ex))
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_excluded(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_audio_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!("Discovered {} audio files under {}", files.len(), input_dir.display());
    Ok(files)
}

fn has_audio_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}

/// `<output_dir>/<path relative to input_dir>`, with the file name passed through
/// [`dub_file_name`] so inputs differing only by extension stay apart.
pub fn output_path_for(input_dir: &Path, output_dir: &Path, file: &Path) -> PathBuf {
    let relative = file
        .strip_prefix(input_dir)
        .ok()
        .map(Path::to_path_buf)
        .or_else(|| file.file_name().map(PathBuf::from))
        .unwrap_or_else(|| file.to_path_buf());
    match relative.file_name() {
        Some(name) => output_dir.join(relative.with_file_name(dub_file_name(name))),
        None => output_dir.join(relative),
    }
}

/// Process every discovered file in order.
///
/// A missing input directory and workspace acquisition failures end the batch with an
/// error; per-file failures are counted and the batch moves on.
pub fn run_batch(orchestrator: &mut PipelineOrchestrator, options: &BatchOptions) -> Result<BatchSummary> {
    let output_dir = orchestrator.config().output_dir.clone();
    let files = discover_audio_files(&options.input_dir, &options.extensions, Some(&output_dir))?;

    let mut summary = BatchSummary {
        discovered: files.len(),
        ..BatchSummary::default()
    };
    if files.is_empty() {
        info!("No audio files found in {}", options.input_dir.display());
        return Ok(summary);
    }
    info!("Found {} audio files in {}", files.len(), options.input_dir.display());

    for (index, file) in files.iter().enumerate() {
        if let Some(limit) = options.limit
            && summary.processed() >= limit
        {
            info!("Reached limit of {} files", limit);
            break;
        }

        info!("[{}/{}] {}", index + 1, files.len(), file.display());
        let final_path = output_path_for(&options.input_dir, &output_dir, file);
        match orchestrator.process_to(file, &final_path)? {
            FileOutcome::Skipped => summary.skipped += 1,
            FileOutcome::Completed { .. } => summary.completed += 1,
            FileOutcome::Failed { .. } => summary.failed += 1,
        }
    }

    info!(
        "Batch finished: {} completed, {} failed, {} skipped",
        summary.completed, summary.failed, summary.skipped
    );
    Ok(summary)
}
