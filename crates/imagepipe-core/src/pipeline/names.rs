//! Original-name bookkeeping across generations.
//!
//! A stage writes its outputs under generated temporary names. The name map
//! produced alongside records, for every generated basename, the name the file
//! had before the first stage ran. Entries always hold first-generation names,
//! so resolving through a single map is enough at any chain depth.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{PipeError, PipeResult};

/// A generated temporary file owned by a stage directory.
///
/// The file lives until the registry sweeps its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFileHandle {
    path: PathBuf,
}

impl TempFileHandle {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the temporary file, used as its name map key.
    pub fn basename(&self) -> String {
        basename(&self.path)
    }
}

/// Name map entry for one generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    /// First-generation basename of the file
    pub original_name: String,
    /// The generated file itself
    pub handle: TempFileHandle,
}

/// Mapping from generated basename to original name for one generation.
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    entries: HashMap<String, NameEntry>,
}

impl NameMap {
    /// Build a map from outputs paired with their inputs' original names.
    ///
    /// Pairs are matched by position, never by searching for a name, so two
    /// inputs that share a basename each keep their own entry.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (TempFileHandle, String)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(handle, original_name)| {
                (
                    handle.basename(),
                    NameEntry {
                        original_name,
                        handle,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Look up the entry for a generated basename.
    pub fn get(&self, basename: &str) -> Option<&NameEntry> {
        self.entries.get(basename)
    }

    /// Number of generated files tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map tracks no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(generated basename, entry)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NameEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Filesystem basename of a path, lossily converted to UTF-8.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Resolve the original basename of `path`.
///
/// Without a map this is the path's own basename. With a map the basename
/// must have an entry; a missing one means a file appeared in a stage
/// directory after the map was built.
pub fn original_name(path: &Path, name_map: Option<&NameMap>) -> PipeResult<String> {
    let name = basename(path);
    match name_map {
        None => Ok(name),
        Some(map) => map
            .get(&name)
            .map(|entry| entry.original_name.clone())
            .ok_or_else(|| PipeError::MissingMapping {
                path: path.to_path_buf(),
                basename: name,
            }),
    }
}

/// Resolve the original basename of `path` with its extension removed.
pub fn original_stem(path: &Path, name_map: Option<&NameMap>) -> PipeResult<String> {
    original_name(path, name_map).map(|name| strip_extension(&name))
}

/// Remove the final extension from a basename (`a.b.png` -> `a.b`).
fn strip_extension(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
