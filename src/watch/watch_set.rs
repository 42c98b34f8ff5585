// src/watch/watch_set.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Set of directories registered (or to be registered) with the notifier.
///
/// Ordered storage only keeps logs and test output stable; order carries no
/// meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    dirs: BTreeSet<PathBuf>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    /// Returns false if the directory was already present.
    pub fn insert(&mut self, dir: impl Into<PathBuf>) -> bool {
        self.dirs.insert(dir.into())
    }

    pub fn remove(&mut self, dir: &Path) -> bool {
        self.dirs.remove(dir)
    }

    /// Directories in `self` that are not in `other`.
    pub fn difference<'a>(&'a self, other: &'a WatchSet) -> impl Iterator<Item = &'a Path> + 'a {
        self.dirs.difference(&other.dirs).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for WatchSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            dirs: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<P: Into<PathBuf>> Extend<P> for WatchSet {
    fn extend<I: IntoIterator<Item = P>>(&mut self, iter: I) {
        self.dirs.extend(iter.into_iter().map(Into::into));
    }
}

impl fmt::Display for WatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dir) in self.dirs.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", dir.display())?;
        }
        Ok(())
    }
}
