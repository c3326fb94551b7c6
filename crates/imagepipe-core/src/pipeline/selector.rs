//! File set resolution: expands selectors (glob patterns or literal paths)
//! into the ordered list of files a pipe operates on.

use glob::{glob, Pattern};
use std::path::{Path, PathBuf};

use crate::error::{PipeError, PipeResult};

/// Expands a fixed list of selectors into concrete file paths.
#[derive(Debug, Clone)]
pub struct FileSetResolver {
    selectors: Vec<String>,
}

impl FileSetResolver {
    /// Create a resolver, rejecting empty or malformed selectors up front.
    pub fn new(selectors: Vec<String>) -> PipeResult<Self> {
        for selector in &selectors {
            if selector.trim().is_empty() {
                return Err(PipeError::InvalidConstruction(
                    "selectors must not be empty strings".into(),
                ));
            }
            Pattern::new(selector).map_err(|e| PipeError::InvalidPattern {
                selector: selector.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(Self { selectors })
    }

    /// The declared selectors, in order.
    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Expand every selector and concatenate the results in selector order.
    ///
    /// `.`/`..` entries and directories are dropped. Overlapping selectors
    /// are not deduplicated. No match at all is an empty list, not an error.
    pub fn resolve(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for selector in &self.selectors {
            // Patterns were checked in `new`
            let paths = match glob(selector) {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!("Skipping selector '{}': {}", selector, e);
                    continue;
                }
            };

            for entry in paths {
                match entry {
                    Ok(path) => {
                        if is_candidate(&path) {
                            files.push(path);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Skipping unreadable entry for '{}': {}", selector, e);
                    }
                }
            }
        }

        tracing::trace!(
            "Resolved {} selector(s) to {} file(s)",
            self.selectors.len(),
            files.len()
        );
        files
    }
}

/// Check that a matched path is a regular entry and not a directory marker.
fn is_candidate(path: &Path) -> bool {
    // `file_name` is None for paths ending in `.` or `..`
    match path.file_name().and_then(|n| n.to_str()) {
        Some(".") | Some("..") | None => false,
        Some(_) => !path.is_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    fn selector(dir: &Path, pattern: &str) -> String {
        dir.join(pattern).to_string_lossy().into_owned()
    }

    #[test]
    fn test_resolve_drops_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("b.jpg"));
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let resolver = FileSetResolver::new(vec![selector(dir.path(), "*.jpg")]).unwrap();
        let files = resolver.resolve();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_resolve_keeps_selector_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join("z.jpg"));

        let resolver = FileSetResolver::new(vec![
            selector(dir.path(), "*.jpg"),
            selector(dir.path(), "*.png"),
        ])
        .unwrap();
        let files = resolver.resolve();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("z.jpg"));
        assert!(files[1].ends_with("a.png"));
    }

    #[test]
    fn test_overlapping_selectors_keep_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        touch(&file);

        let resolver = FileSetResolver::new(vec![
            selector(dir.path(), "*"),
            file.to_string_lossy().into_owned(),
        ])
        .unwrap();

        assert_eq!(resolver.resolve(), vec![file.clone(), file]);
    }

    #[test]
    fn test_literal_path_selector() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("only.gif");
        touch(&file);

        let resolver =
            FileSetResolver::new(vec![file.to_string_lossy().into_owned()]).unwrap();
        assert_eq!(resolver.resolve(), vec![file]);
    }

    #[test]
    fn test_no_matches_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FileSetResolver::new(vec![selector(dir.path(), "*.webp")]).unwrap();
        assert!(resolver.resolve().is_empty());

        let resolver = FileSetResolver::new(vec![]).unwrap();
        assert!(resolver.resolve().is_empty());
    }

    #[test]
    fn test_rejects_bad_selectors() {
        let err = FileSetResolver::new(vec!["".to_string()]).unwrap_err();
        assert!(matches!(err, PipeError::InvalidConstruction(_)));

        let err = FileSetResolver::new(vec!["photos/[".to_string()]).unwrap_err();
        assert!(matches!(err, PipeError::InvalidPattern { .. }));
    }

    #[test]
    fn test_is_candidate() {
        assert!(!is_candidate(Path::new(".")));
        assert!(!is_candidate(Path::new("..")));
        assert!(is_candidate(Path::new("does-not-exist.jpg")));
    }
}
