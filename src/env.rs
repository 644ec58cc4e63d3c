use std::env as stdenv;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Working-directory context shared by everything the shell evaluates.
///
/// Cloning an `Environment` is cheap and every clone observes the same
/// directory: pipeline stages running on other threads get a clone, and a
/// `cd` in any of them is visible to all. Readers take a snapshot through
/// [`Environment::current_dir`] at the point of use, so a stage that runs `cd`
/// while a sibling stage is resolving a path races with it. That race is
/// accepted; nothing serializes stages against each other.
///
/// The process working directory (`std::env::set_current_dir`) is never
/// touched.
#[derive(Debug, Clone)]
pub struct Environment {
    current_dir: Arc<RwLock<PathBuf>>,
}

impl Environment {
    /// Capture the process working directory into a new `Environment`.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_dir(current_dir)
    }

    /// Start from an explicit working directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: Arc::new(RwLock::new(dir.into())),
        }
    }

    /// Snapshot of the current working directory.
    pub fn current_dir(&self) -> PathBuf {
        self.current_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The only writer of the working directory; used by `cd`.
    pub fn set_current_dir(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        log::debug!("working directory -> {}", dir.display());
        *self
            .current_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dir;
    }

    /// Resolve `path` against the working directory unless it is absolute.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir().join(path)
        }
    }

    /// Value of a process environment variable such as `HOME`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
