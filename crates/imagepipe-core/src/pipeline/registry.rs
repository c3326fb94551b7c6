//! Registry of temporary stage directories.
//!
//! Every stage writes its generation into a fresh directory obtained here.
//! Directories are never released mid-run: a later pipe may still read from
//! any earlier generation. They are removed together by [`TempRegistry::sweep`],
//! which also runs when the registry is dropped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tempfile::TempDir;

use crate::config::Config;
use crate::error::{PipeError, PipeResult};

/// Append-only registry of stage directories with a deferred sweep.
#[derive(Debug)]
pub struct TempRegistry {
    root: Option<PathBuf>,
    prefix: String,
    dirs: Mutex<Vec<TempDir>>,
    swept: AtomicBool,
}

impl TempRegistry {
    /// Create a registry that places directories in the system temp dir.
    pub fn new() -> Self {
        Self::with_root(None, "imagepipe")
    }

    /// Create a registry with an explicit parent directory and name prefix.
    pub fn with_root(root: Option<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root,
            prefix: prefix.into(),
            dirs: Mutex::new(Vec::new()),
            swept: AtomicBool::new(false),
        }
    }

    /// Create a registry from the `[temp]` section of the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_root(config.temp_dir(), config.temp.prefix.clone())
    }

    /// Create and register a fresh, empty, uniquely named directory.
    pub fn create_dir(&self) -> PipeResult<PathBuf> {
        let prefix = format!("{}-", self.prefix);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match &self.root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| PipeError::TempDirCreationFailed { source })?;

        let path = dir.path().to_path_buf();
        self.lock().push(dir);
        tracing::debug!("Registered temporary directory {:?}", path);
        Ok(path)
    }

    /// Paths of every directory registered so far, in creation order.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|d| d.path().to_path_buf()).collect()
    }

    /// Number of registered directories.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no directory has been registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether the sweep has already run.
    pub fn is_swept(&self) -> bool {
        self.swept.load(Ordering::SeqCst)
    }

    /// Recursively remove every registered directory.
    ///
    /// Runs once; later calls do nothing and return 0. Directories that were
    /// already removed out-of-band are skipped silently. Returns the number of
    /// directories removed by this call.
    pub fn sweep(&self) -> usize {
        if self.swept.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let dirs: Vec<TempDir> = self.lock().drain(..).collect();
        let mut removed = 0;
        for dir in dirs {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => {
                    tracing::info!("Removed temporary directory {:?}", path);
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Temporary directory {:?} already gone", path);
                }
                Err(e) => {
                    // An abandoned worker may still be writing into the directory
                    tracing::debug!("Retrying removal of {:?}: {}", path, e);
                    match remove_with_retry(&path) {
                        Ok(()) => {
                            tracing::info!("Removed temporary directory {:?}", path);
                            removed += 1;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to remove temporary directory {:?}: {}", path, e);
                        }
                    }
                }
            }
        }
        removed
    }

    /// Parent directory used for new stage directories, if one was configured.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TempDir>> {
        self.dirs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Attempts made by [`remove_with_retry`]
const REMOVE_ATTEMPTS: u32 = 5;

fn remove_with_retry(path: &Path) -> std::io::Result<()> {
    let mut attempt = 1;
    loop {
        match std::fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) if attempt >= REMOVE_ATTEMPTS => return Err(e),
            Err(_) => {
                std::thread::sleep(Duration::from_millis(50 * u64::from(attempt)));
                attempt += 1;
            }
        }
    }
}

impl Default for TempRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempRegistry {
    fn drop(&mut self) {
        self.sweep();
    }
}
