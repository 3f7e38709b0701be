use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::external_sort::constants::*;

/// Hands out uniquely named scratch files inside a per-run directory and deletes them
/// once their last reader is done.
pub struct ScratchSpace {
    run_directory: PathBuf,
    next_id: AtomicUsize,
    live_files: Mutex<HashSet<PathBuf>>,
    keep_files: bool,
    // Removes the run directory on drop if cleanup never ran. None when files are kept.
    _run_guard: Option<TempDir>,
}

impl ScratchSpace {
    pub fn create(temp_directory: &Path, keep_files: bool) -> Result<Self> {
        std::fs::create_dir_all(temp_directory).with_context(|| {
            format!("Failed to create temp directory {}", temp_directory.display())
        })?;
        let run_dir = tempfile::Builder::new()
            .prefix(RUN_DIR_PREFIX)
            .tempdir_in(temp_directory)
            .with_context(|| {
                format!("Failed to create scratch directory in {}", temp_directory.display())
            })?;

        let (run_directory, run_guard) = if keep_files {
            (run_dir.into_path(), None)
        } else {
            (run_dir.path().to_path_buf(), Some(run_dir))
        };
        debug!("Scratch directory: {}", run_directory.display());

        Ok(Self {
            run_directory,
            next_id: AtomicUsize::new(0),
            live_files: Mutex::new(HashSet::new()),
            keep_files,
            _run_guard: run_guard,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.run_directory
    }

    /// Returns a fresh path. The file itself is created by whoever writes it.
    pub fn allocate(&self) -> PathBuf {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let path = self.run_directory.join(format!(
            "{}{}{}",
            SCRATCH_FILE_PREFIX, id, SCRATCH_FILE_EXTENSION
        ));
        self.live_files.lock().insert(path.clone());
        path
    }

    pub fn live_count(&self) -> usize {
        self.live_files.lock().len()
    }

    /// Deletes a scratch file that has no remaining readers.
    pub fn release(&self, path: &Path) {
        if !self.live_files.lock().remove(path) {
            return;
        }
        if self.keep_files {
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove scratch file {}: {}", path.display(), e);
        }
    }

    /// Removes every remaining scratch file and the run directory.
    pub fn cleanup(&self) {
        let remaining: Vec<PathBuf> = self.live_files.lock().drain().collect();
        if self.keep_files {
            debug!("Keeping {} scratch files in {}", remaining.len(), self.run_directory.display());
            return;
        }

        for path in remaining {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove scratch file {}: {}", path.display(), e);
                }
            }
        }

        if let Err(e) = std::fs::remove_dir(&self.run_directory) {
            warn!("Failed to remove scratch directory {}: {}", self.run_directory.display(), e);
        }
    }
}
