//! Resumable per-file job state, persisted as `manifest.json` in the output directory.
//!
//! The store never fails a batch: unreadable or corrupt manifests load as empty state
//! and write failures are logged, so processing continues with best-effort tracking.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, warn};

/// Final state of a processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Completed,
    Failed,
}

/// Transcripts recorded for a completed file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionMetadata {
    pub original_text: String,
    pub translated_text: String,
}

/// One manifest record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub status: JobStatus,
    /// RFC 3339, local time.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CompletionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ManifestEntry {
    fn completed(metadata: CompletionMetadata) -> Self {
        Self {
            status: JobStatus::Completed,
            timestamp: now(),
            metadata: Some(metadata),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            status: JobStatus::Failed,
            timestamp: now(),
            metadata: None,
            error: Some(error),
        }
    }
}

fn now() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Manifest-backed record of which files are done.
#[derive(Debug)]
pub struct JobStateStore {
    manifest_path: PathBuf,
    root: PathBuf,
    entries: BTreeMap<String, ManifestEntry>,
}

impl JobStateStore {
    /// Load the store for `output_dir`, keying files relative to the working directory.
    pub fn new(output_dir: &Path) -> Self {
        let root = std::env::current_dir().unwrap_or_else(|e| {
            warn!("Cannot determine working directory, using absolute file keys: {}", e);
            PathBuf::new()
        });
        Self::with_root(output_dir, &root)
    }

    /// Load the store for `output_dir`, keying files relative to `root`.
    pub fn with_root(output_dir: &Path, root: &Path) -> Self {
        let manifest_path = output_dir.join(defaults::MANIFEST_FILE);
        let entries = load_entries(&manifest_path);
        Self {
            manifest_path,
            root: absolutize(root),
            entries,
        }
    }

    /// True iff `file` has a completed entry. Failed files are retried.
    pub fn is_processed(&self, file: &Path) -> bool {
        self.entry(file)
            .is_some_and(|e| e.status == JobStatus::Completed)
    }

    pub fn mark_completed(&mut self, file: &Path, metadata: CompletionMetadata) {
        let key = self.identity(file);
        self.entries.insert(key, ManifestEntry::completed(metadata));
        self.persist();
    }

    pub fn mark_failed(&mut self, file: &Path, error: impl Into<String>) {
        let key = self.identity(file);
        self.entries.insert(key, ManifestEntry::failed(error.into()));
        self.persist();
    }

    pub fn entry(&self, file: &Path) -> Option<&ManifestEntry> {
        self.entries.get(&self.identity(file))
    }

    /// Manifest key for `file`.
    pub fn identity(&self, file: &Path) -> String {
        file_identity(file, &self.root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Rewrite the whole manifest. Failures are logged, never returned.
    fn persist(&self) {
        if let Err(e) = self.write_manifest() {
            error!(
                "Failed to save manifest {}: {}",
                self.manifest_path.display(),
                e
            );
        }
    }

    fn write_manifest(&self) -> std::io::Result<()> {
        let dir = match self.manifest_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut staging = tempfile::NamedTempFile::new_in(dir)?;
        staging.write_all(json.as_bytes())?;
        staging.as_file().sync_all()?;
        staging.persist(&self.manifest_path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, ManifestEntry> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No manifest at {}, starting fresh", path.display());
            return BTreeMap::new();
        }
        Err(e) => {
            warn!("Failed to read manifest {}: {}", path.display(), e);
            return BTreeMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            error!(
                "Manifest {} is corrupt, starting with empty state: {}",
                path.display(),
                e
            );
            BTreeMap::new()
        }
    }
}

/// Stable key for `file`: its normalized path relative to `root`, or the normalized
/// absolute path when it lives outside `root`.
pub fn file_identity(file: &Path, root: &Path) -> String {
    let absolute = absolutize(file);
    let root = absolutize(root);
    match absolute.strip_prefix(&root) {
        Ok(relative) if !relative.as_os_str().is_empty() && !root.as_os_str().is_empty() => {
            relative.to_string_lossy().into_owned()
        }
        _ => absolute.to_string_lossy().into_owned(),
    }
}

/// Make `path` absolute against the working directory and resolve `.`/`..` lexically.
fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
