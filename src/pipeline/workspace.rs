//! Per-file scratch directory.

use crate::defaults;
use crate::error::{RedubError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Uniquely named scratch directory owned by one `process` call.
///
/// The directory and everything in it is removed when the workspace is dropped, which
/// covers early returns and panics unwinding out of the orchestrator.
#[derive(Debug)]
pub struct ProcessingWorkspace {
    dir: TempDir,
}

impl ProcessingWorkspace {
    /// Create a fresh workspace under `scratch_root`, or the system temp dir.
    pub fn acquire(scratch_root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(defaults::WORKSPACE_PREFIX);

        let created = match scratch_root {
            Some(root) => std::fs::create_dir_all(root).and_then(|()| builder.tempdir_in(root)),
            None => builder.tempdir(),
        };
        let dir = created.map_err(|e| RedubError::WorkspaceAcquisition {
            message: match scratch_root {
                Some(root) => format!("{}: {}", root.display(), e),
                None => e.to_string(),
            },
        })?;

        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for an intermediate artifact inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Replace `dest` with a copy of the whole workspace tree for inspection.
    ///
    /// Best effort: problems are logged and the copy continues with the next entry.
    pub fn mirror_to(&self, dest: &Path) {
        if dest.exists()
            && let Err(e) = std::fs::remove_dir_all(dest)
        {
            warn!("Failed to clear old debug copy {}: {}", dest.display(), e);
        }

        let root = self.dir.path();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping workspace entry while mirroring: {}", e);
                    continue;
                }
            };
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let target = dest.join(relative);
            let copied = if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)
            } else {
                target
                    .parent()
                    .map_or(Ok(()), std::fs::create_dir_all)
                    .and_then(|()| std::fs::copy(entry.path(), &target).map(|_| ()))
            };
            if let Err(e) = copied {
                warn!("Failed to mirror {} to {}: {}", entry.path().display(), target.display(), e);
            }
        }
        debug!("Mirrored workspace to {}", dest.display());
    }

    /// Delete the workspace now, reporting failures instead of ignoring them.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
    }
}
