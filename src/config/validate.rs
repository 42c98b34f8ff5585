// src/config/validate.rs

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::config::model::Options;
use crate::errors::{Result, TreeloadError};
use crate::types::ReloadPolicyKind;
use crate::watch::filter::{ExtensionFilter, IgnoreSet};

impl Options {
    /// Check the options and normalize them into [`Settings`].
    ///
    /// `native_extension` is the source extension of the build ecosystem the
    /// import source understands; it is used when no extensions were given.
    pub fn validate(self, native_extension: &str) -> Result<Settings> {
        let entry = validate_entry(&self.entry)?;

        if self.max_depth == 0 {
            return Err(TreeloadError::Configuration(
                "max_depth must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.policy == ReloadPolicyKind::Debounce && self.debounce.is_zero() {
            return Err(TreeloadError::Configuration(
                "debounce policy needs a non-zero window".to_string(),
            ));
        }

        let mut extensions = ExtensionFilter::new(&self.extensions);
        if extensions.is_empty() {
            extensions = ExtensionFilter::new([native_extension]);
        }
        let ignore = IgnoreSet::new(&self.ignore)?;

        Ok(Settings {
            entry,
            extensions,
            ignore,
            verbose: self.verbose,
            max_depth: self.max_depth,
            policy: self.policy,
            debounce: self.debounce,
        })
    }
}

fn validate_entry(entry: &Path) -> Result<PathBuf> {
    if entry.as_os_str().is_empty() {
        return Err(TreeloadError::Configuration(
            "must include an entry file".to_string(),
        ));
    }
    let absolute = std::path::absolute(entry).map_err(|e| {
        TreeloadError::Configuration(format!("cannot make {:?} absolute: {e}", entry))
    })?;
    if !absolute.is_file() {
        return Err(TreeloadError::Configuration(format!(
            "entry {:?} is not a file",
            absolute
        )));
    }
    // Canonical form so event paths and cargo's src_path compare equal.
    Ok(absolute.canonicalize().unwrap_or(absolute))
}
