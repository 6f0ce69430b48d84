//! Directory search path for locating files named by other files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Separators used when a directory list comes from an environment
/// variable.
pub const DEFAULT_ENV_SEPARATORS: &str = ":\t ";

/// Ordered list of directories searched for files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchPath {
    /// Search path holding only the current directory.
    pub fn new() -> Self {
        Self {
            dirs: vec![PathBuf::from(".")],
        }
    }

    /// Search path with no directories at all.
    pub fn empty() -> Self {
        Self { dirs: Vec::new() }
    }

    /// Put `dir` first. A directory already listed is moved.
    pub fn add_directory_first(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.dirs.retain(|d| *d != dir);
        self.dirs.insert(0, dir);
    }

    /// Put `dir` last. A directory already listed is moved.
    pub fn add_directory_last(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.dirs.retain(|d| *d != dir);
        self.dirs.push(dir);
    }

    /// Append the directories listed in environment variable `var`, split
    /// at any of `separators`. Returns the number of directories added.
    pub fn add_env_directories(&mut self, var: &str, separators: &str) -> usize {
        let dirs = env_directories(var, separators);
        let count = dirs.len();
        for dir in dirs {
            self.add_directory_last(dir);
        }
        count
    }

    /// Prepend the directories listed in environment variable `var`,
    /// keeping their order.
    pub fn add_env_directories_first(&mut self, var: &str, separators: &str) -> usize {
        let dirs = env_directories(var, separators);
        let count = dirs.len();
        for dir in dirs.into_iter().rev() {
            self.add_directory_first(dir);
        }
        count
    }

    /// Remove `dir`. Returns whether it was listed.
    pub fn remove_directory(&mut self, dir: impl AsRef<Path>) -> bool {
        let before = self.dirs.len();
        self.dirs.retain(|d| d.as_path() != dir.as_ref());
        self.dirs.len() != before
    }

    /// Remove every directory, including the current one.
    pub fn clear(&mut self) {
        self.dirs.clear();
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Locate `name`. An absolute path, or a relative one that exists as
    /// given, wins; otherwise each directory is tried in order.
    pub fn find_file(&self, name: impl AsRef<Path>) -> Option<PathBuf> {
        find_in(name.as_ref(), self.dirs.iter().map(PathBuf::as_path))
    }
}

/// Locate `name` directly, then in each of `dirs`.
pub(crate) fn find_in<'a>(
    name: &Path,
    dirs: impl IntoIterator<Item = &'a Path>,
) -> Option<PathBuf> {
    if name.as_os_str().is_empty() {
        return None;
    }
    if name.is_file() {
        return Some(name.to_path_buf());
    }
    if name.is_absolute() {
        return None;
    }
    dirs.into_iter().map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}

fn env_directories(var: &str, separators: &str) -> Vec<PathBuf> {
    std::env::var(var)
        .map(|value| {
            value
                .split(|c: char| separators.contains(c))
                .filter(|part| !part.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

/// File name without its directories, e.g. `b.iv` for `a/b.iv`.
pub fn base_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory part of a path, e.g. `a` for `a/b.iv`; empty for a bare name.
pub fn path_name(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().parent().map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_current_dir() {
        assert_eq!(SearchPath::default().directories(), &[PathBuf::from(".")]);
    }

    #[test]
    fn test_ordering() {
        let mut path = SearchPath::new();
        path.add_directory_last("/b");
        path.add_directory_first("/a");
        path.add_directory_last(".");
        assert_eq!(
            path.directories(),
            &[PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from(".")]
        );
        assert!(path.remove_directory("/b"));
        assert!(!path.remove_directory("/b"));
        path.clear();
        assert!(path.directories().is_empty());
    }

    #[test]
    fn test_find_file_in_directories() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("scene.iv"), b"#Inventor V2.1 ascii\n").unwrap();

        let mut path = SearchPath::empty();
        path.add_directory_last(first.path());
        assert!(path.find_file("scene.iv").is_none());
        path.add_directory_last(second.path());
        assert_eq!(path.find_file("scene.iv"), Some(second.path().join("scene.iv")));

        let absolute = second.path().join("scene.iv");
        assert_eq!(SearchPath::empty().find_file(&absolute), Some(absolute.clone()));
        assert!(path.find_file("").is_none());
    }

    #[test]
    fn test_env_directories() {
        std::env::set_var("IVIO_TEST_SEARCH_DIRS", "/x:/y\t/z  ");
        let mut path = SearchPath::empty();
        assert_eq!(path.add_env_directories("IVIO_TEST_SEARCH_DIRS", DEFAULT_ENV_SEPARATORS), 3);
        assert_eq!(path.directories().len(), 3);
        let mut path = SearchPath::new();
        path.add_env_directories_first("IVIO_TEST_SEARCH_DIRS", DEFAULT_ENV_SEPARATORS);
        assert_eq!(path.directories()[0], PathBuf::from("/x"));
        assert_eq!(path.directories()[3], PathBuf::from("."));
        assert_eq!(path.add_env_directories("IVIO_TEST_UNSET_VAR", ":"), 0);
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(base_name("models/a/b.iv"), "b.iv");
        assert_eq!(path_name("models/a/b.iv"), PathBuf::from("models/a"));
        assert_eq!(path_name("b.iv"), PathBuf::new());
    }
}
