// src/watch/filter.rs

//! Event relevance: which writes can start a reload cycle at all.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::EventKind;
use notify::event::ModifyKind;

use crate::errors::{Result, TreeloadError};

/// Allow-list of file extensions, stored without the leading dot.
///
/// `".rs"`, `"rs"` and `" rs "` all normalize to `"rs"`, which is also what
/// `Path::extension` hands back, so lookups need no further massaging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    exts: BTreeSet<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exts = exts
            .into_iter()
            .filter_map(|e| normalize_extension(e.as_ref()))
            .collect();
        Self { exts }
    }

    pub fn is_empty(&self) -> bool {
        self.exts.is_empty()
    }

    pub fn contains(&self, ext: &str) -> bool {
        normalize_extension(ext).is_some_and(|e| self.exts.contains(&e))
    }

    /// Returns true if `path` has one of the allowed extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.exts.contains(e))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.exts.iter().map(String::as_str)
    }
}

impl fmt::Display for ExtensionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list: Vec<&str> = self.iter().collect();
        f.write_str(&list.join(","))
    }
}

fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Compiled ignore globs, matched against absolute event paths.
#[derive(Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<String>,
    set: Option<GlobSet>,
}

impl fmt::Debug for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreSet")
            .field("patterns", &self.patterns)
            .finish()
    }
}

impl IgnoreSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = Glob::new(pat).map_err(|e| {
                TreeloadError::Configuration(format!("invalid ignore glob {pat:?}: {e}"))
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| {
            TreeloadError::Configuration(format!("failed to build ignore globs: {e}"))
        })?;
        Ok(Self {
            patterns: patterns.to_vec(),
            set: Some(set),
        })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.set.as_ref().is_some_and(|s| s.is_match(path))
    }
}

/// Only writes to file contents count; creates, renames, metadata changes
/// and removals are dropped.
pub fn is_content_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}
